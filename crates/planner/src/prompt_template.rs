use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered.trim().to_string())
}

/// Render one of the prompts bundled under `src/prompts`
pub fn load_prompt_file<T: Serialize>(
    template_file: &str,
    context_data: &T,
) -> Result<String, TeraError> {
    let file = PROMPTS_DIR
        .get_file(template_file)
        .ok_or_else(|| TeraError::msg(format!("Prompt template not found: {}", template_file)))?;
    let template_content = file
        .contents_utf8()
        .ok_or_else(|| TeraError::msg(format!("Prompt template is not UTF-8: {}", template_file)))?;
    load_prompt(template_content, context_data)
}
