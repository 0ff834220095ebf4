//! Scaffold a new project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use gantry_pipeline::Config;

use super::Settings;

/// Run the init command.
pub async fn run(settings: &Settings, yes: bool) -> Result<()> {
    tracing::info!("Initializing gantry project...");

    let root = settings.project_root()?;
    let created = scaffold(&root, yes)?;

    if created == 0 {
        tracing::warn!("Nothing to do, every file already exists. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'gantry dev' to start the development server.");

    Ok(())
}

/// Write the starter files under `root`, returning how many were written.
fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    let config = format!(
        "# gantry configuration\n# Every setting is optional; these are the defaults.\n\n{}",
        toml::to_string_pretty(&Config::default()).context("Failed to render default config")?
    );

    let files: [(&str, &str); 7] = [
        ("gantry.toml", config.as_str()),
        ("src/index.html", DEFAULT_INDEX),
        ("src/partials/header.html", DEFAULT_HEADER),
        ("src/styles/main.css", DEFAULT_MAIN_CSS),
        ("src/styles/_variables.css", DEFAULT_VARIABLES_CSS),
        ("src/static/js/scripts.js", DEFAULT_SCRIPT),
        ("src/static/img/logo.svg", DEFAULT_LOGO),
    ];

    let mut written = 0;
    for (relative, contents) in files {
        let path = root.join(relative);
        if path.exists() && !overwrite {
            tracing::debug!("Keeping existing {}", relative);
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
        written += 1;
    }

    fs::create_dir_all(root.join("src/static/fonts")).context("Failed to create fonts directory")?;

    Ok(written)
}

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Home</title>
  <link rel="stylesheet" href="/static/css/main.css">
</head>
<body>
  {% include "partials/header.html" %}
  <main class="content">
    <h1 class="content__title">Hello from gantry</h1>
    {% if debug %}<p class="content__note">Debug build</p>{% endif %}
  </main>
  <script src="/static/js/scripts.js"></script>
</body>
</html>
"#;

const DEFAULT_HEADER: &str = r#"<header class="header">
  <a class="header__logo" href="/"><img src="/static/img/logo.svg" alt="Logo" width="32" height="32"></a>
</header>
"#;

const DEFAULT_MAIN_CSS: &str = r#"@import "_variables.css";

body {
  margin: 0;
  font-family: var(--font);
  color: var(--text);
}

.header {
  display: flex;
  padding: 1rem;
  user-select: none;
}

.content {
  max-width: 40rem;
  margin: 0 auto;
}
"#;

const DEFAULT_VARIABLES_CSS: &str = r#":root {
  --font: system-ui, sans-serif;
  --text: #1f2933;
}
"#;

const DEFAULT_SCRIPT: &str = r#"document.addEventListener('DOMContentLoaded', function () {
  console.log('gantry ready');
});
"#;

const DEFAULT_LOGO: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32"><rect width="32" height="32" rx="6" fill="#3b82f6"/></svg>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scaffolds_default_layout() {
        let temp = tempdir().unwrap();

        let written = scaffold(temp.path(), false).unwrap();

        assert_eq!(written, 7);
        assert!(temp.path().join("src/index.html").exists());
        assert!(temp.path().join("src/static/fonts").is_dir());

        let config = fs::read_to_string(temp.path().join("gantry.toml")).unwrap();
        assert_eq!(Config::parse(&config).unwrap(), Config::default());
    }

    #[test]
    fn keeps_existing_files_unless_overwriting() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.html"), "mine").unwrap();

        assert_eq!(scaffold(temp.path(), false).unwrap(), 6);
        assert_eq!(fs::read_to_string(temp.path().join("src/index.html")).unwrap(), "mine");

        assert_eq!(scaffold(temp.path(), true).unwrap(), 7);
        assert_ne!(fs::read_to_string(temp.path().join("src/index.html")).unwrap(), "mine");
    }
}
