use crate::{
    RenderArgs,
    config::Config,
    render::{DocumentRenderer, RenderRequest},
    services::Services,
};

pub async fn run(args: &RenderArgs) -> Result<(), anyhow::Error> {
    let config = Config::load_from_arg(args.config_file.as_deref())?;

    let template_path = super::absolute(&args.template)?;
    let template = super::read_template(&template_path).await?;
    let data = super::read_data(args.data.as_deref()).await?;

    let services = Services::from_config(&config, args.records.as_deref())?;
    let renderer = DocumentRenderer::new(&config, services)?;

    let request = RenderRequest {
        organization_id: args.organization_id.clone(),
        document_id: args.document_id.clone(),
    };

    let document = renderer.render(&template, &data, &request).await?;

    let output = match &args.output {
        Some(output) => super::absolute(output)?,
        None => template_path.with_extension("html"),
    };
    tokio::fs::write(&output, &document.html).await?;

    println!(
        "Rendered {output} ({pages} page(s), {warnings} warning(s))",
        output = output.display(),
        pages = document.page_count,
        warnings = document.warnings.len()
    );
    for warning in &document.warnings {
        eprintln!("  warning: {warning}");
    }

    if args.open
        && let Err(e) = open::that(&output)
    {
        eprintln!("Failed to open document: {}", e);
    }

    Ok(())
}
