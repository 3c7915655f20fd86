use crate::{
    InitArgs,
    config::{Config, DEFAULT_CONFIG_FILE},
};

const SAMPLE_TEMPLATE: &str = r#"# Document template, in the shape stored by the editor.
name: Convocation
type: convocation
page_size: A4
font_size: 10
margins: { top: 15, right: 15, bottom: 15, left: 15 }

# Leave the header empty to use the default organization header.
header: ""
footer_enabled: true
footer_height: 20

content: |
  <h1>Convocation à la formation {formation_nom}</h1>
  <p>Bonjour {apprenant_prenom} {apprenant_nom},</p>
  <p>Nous avons le plaisir de vous convier à la session du {session_date_debut}.</p>
  {IF modules}
  <h2>Programme</h2>
  {TABLE modules: titre=Module, duree=Durée (h)}
  <p>Durée totale : {SUM(modules.duree)} heures</p>
  {ENDIF}
  <p>Contact : {EMAIL ecole_email}</p>
  <img class="qr-code-dynamic" data-qr-data="{session_url}" style="max-width: 120px;" />
  <signature-field id="signature-apprenant" type="signature" label="Signature de l'apprenant" signer-role="apprenant" />
"#;

const SAMPLE_VARIABLES: &str = r#"{
  "ecole_nom": "Organisme de formation",
  "ecole_adresse": "1 rue de la Paix",
  "ecole_code_postal": "75002",
  "ecole_ville": "Paris",
  "ecole_email": "contact@example.com",
  "ecole_siret": "123 456 789 00010",
  "formation_nom": "Sécurité incendie",
  "apprenant_prenom": "Marie",
  "apprenant_nom": "Curie",
  "session_date_debut": "12/01/2026",
  "session_url": "https://example.com/sessions/42",
  "modules": [
    { "titre": "Accueil", "duree": 1 },
    { "titre": "Prévention", "duree": 3.5 }
  ]
}
"#;

pub async fn run(args: &InitArgs) -> Result<(), anyhow::Error> {
    let path = super::absolute(&args.path)?;

    if !path.exists() {
        if args.create {
            tokio::fs::create_dir_all(&path).await?;
            println!("Created directory {path}", path = path.display());
        } else {
            return Err(anyhow::anyhow!(
                "Directory does not exist: {path}",
                path = path.display()
            ));
        }
    }

    println!("Initializing project in {}", path.display());

    let config_text = serde_yaml::to_string(&Config::default())?;
    let files = [
        (DEFAULT_CONFIG_FILE, config_text.as_str()),
        ("template.yaml", SAMPLE_TEMPLATE),
        ("variables.json", SAMPLE_VARIABLES),
    ];

    for (name, content) in files {
        let file = path.join(name);
        if file.exists() {
            println!("Skipped {file}, it already exists", file = file.display());
            continue;
        }
        tokio::fs::write(&file, content).await?;
        println!("Created {file}", file = file.display());
    }

    println!("\nPreview with: formadoc serve --template template.yaml --data variables.json");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{read_data, read_template};

    #[tokio::test]
    async fn test_init_writes_loadable_samples() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            path: dir.path().to_path_buf(),
            create: false,
        };
        run(&args).await.unwrap();

        let config_path = dir.path().join(DEFAULT_CONFIG_FILE);
        let config = Config::load_from_arg(Some(config_path.as_path())).unwrap();
        assert_eq!(config.render.chars_per_page, 3000);

        let template = read_template(&dir.path().join("template.yaml")).await.unwrap();
        assert_eq!(template.title(), "Convocation");
        assert!(template.content_html().contains("{TABLE modules"));

        let data = read_data(Some(dir.path().join("variables.json").as_path())).await.unwrap();
        assert_eq!(data["apprenant_prenom"], "Marie");
    }

    #[tokio::test]
    async fn test_init_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            path: dir.path().join("new"),
            create: false,
        };
        assert!(run(&args).await.is_err());

        let args = InitArgs {
            path: dir.path().join("new"),
            create: true,
        };
        run(&args).await.unwrap();
        assert!(dir.path().join("new/template.yaml").exists());
    }
}
