//! Header and footer used when a template leaves them empty.
//!
//! Both are written in the template language and go through the same
//! stages as any other buffer. Organization details are read from the
//! `ecole_*` variables, falling back to `organization_*`.

/// `{IF primary}{primary}{ELSE}{fallback}{ENDIF}`
fn either(primary: &str, fallback: &str) -> String {
    format!("{{IF {primary}}}{{{primary}}}{{ELSE}}{{{fallback}}}{{ENDIF}}")
}

const DETAIL_STYLE: &str = "font-size: 9pt; color: #666; line-height: 1.4;";

/// Organization identity on the left, logo on the right.
pub fn default_header() -> String {
    let name = either("ecole_nom", "organization_name");
    let address = either("ecole_adresse", "organization_address");
    let email = either("ecole_email", "organization_email");
    let phone = either("ecole_telephone", "organization_phone");
    let logo = either("ecole_logo", "organization_logo");

    format!(
        concat!(
            r#"<div style="display: flex; justify-content: space-between; align-items: center; padding-bottom: 10px; border-bottom: 2px solid #1A1A1A;">"#,
            r#"<div style="flex: 1;">"#,
            r#"<div style="font-weight: bold; font-size: 14pt; color: #1A1A1A; margin-bottom: 4px;">{name}</div>"#,
            r#"{{IF ecole_adresse || organization_address}}<div style="{detail}">{address}</div>{{ENDIF}}"#,
            r#"{{IF ecole_code_postal || ecole_ville}}<div style="{detail}">{{ecole_code_postal}} {{ecole_ville}}</div>{{ENDIF}}"#,
            r#"{{IF ecole_email || organization_email}}<div style="{detail}">Email : {email}</div>{{ENDIF}}"#,
            r#"{{IF ecole_telephone || organization_phone}}<div style="{detail}">Tél : {phone}</div>{{ENDIF}}"#,
            "</div>",
            r#"{{IF ecole_logo || organization_logo}}<div style="margin-left: 20px;">{logo}</div>{{ENDIF}}"#,
            "</div>"
        ),
        name = name,
        address = address,
        email = email,
        phone = phone,
        logo = logo,
        detail = DETAIL_STYLE,
    )
}

/// Legal mentions of a training organization.
pub fn default_footer() -> String {
    let name = either("ecole_nom", "organization_name");
    let address = either("ecole_adresse", "organization_address");
    let siret = either("ecole_siret", "organization_siret");
    let declaration = either(
        "ecole_numero_declaration",
        "organization_declaration_number",
    );

    format!(
        concat!(
            r#"<div style="font-size: 8pt; color: #666; text-align: center; line-height: 1.5;">"#,
            "<div>{name} | {address} {{ecole_ville}} {{ecole_code_postal}}",
            "{{IF ecole_siret || organization_siret}} | Numéro SIRET: {siret}{{ENDIF}}</div>",
            "{{IF ecole_numero_declaration || organization_declaration_number}}",
            "<div>Numéro de déclaration d'activité: {declaration}",
            "{{IF ecole_region}} <em>(auprès du préfet de région de: {{ecole_region}})</em>{{ENDIF}}</div>",
            "<div><em>Cet enregistrement ne vaut pas l'agrément de l'État.</em></div>",
            "{{ENDIF}}",
            "</div>"
        ),
        name = name,
        address = address,
        siret = siret,
        declaration = declaration,
    )
}
