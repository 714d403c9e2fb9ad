use minijinja::{context, Environment};
use tracing::error;

use crate::util::network::{BLOCKED_MESSAGE, BLOCKED_TITLE};

pub fn init_templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();

    env.add_template("blocked.html", include_str!("../../templates/blocked.html"))?;
    env.add_template("error.html", include_str!("../../templates/error.html"))?;

    Ok(env)
}

fn render(env: &Environment, template_name: &str, ctx: minijinja::Value) -> String {
    match env.get_template(template_name) {
        Ok(tmpl) => match tmpl.render(ctx) {
            Ok(result) => result,
            Err(e) => {
                error!("Template render error: {}", e);
                format!("<h1>Template Error</h1><p>{}</p>", e)
            }
        },
        Err(e) => {
            error!("Template not found: {} ({})", template_name, e);
            format!("<h1>Template Not Found</h1><p>{}: {}</p>", template_name, e)
        }
    }
}

pub fn render_blocked(env: &Environment) -> String {
    render(
        env,
        "blocked.html",
        context! { title => BLOCKED_TITLE, message => BLOCKED_MESSAGE },
    )
}

pub fn render_error(env: &Environment, status: &str, message: &str, hint: Option<&str>) -> String {
    render(
        env,
        "error.html",
        context! { status => status, message => message, hint => hint },
    )
}
