//! Config subcommand handlers. None of these touch the network.

use std::path::Path;

use circlescope_config::{self as config, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, detail_lines};

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    handle_at(args.command, global, &config::config_path())
}

fn handle_at(command: ConfigCommand, global: &GlobalOpts, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommand::Init {
            server,
            name,
            force,
        } => {
            let mut cfg = config::load_config_from(path)?;
            init_profile(&mut cfg, &name, server, force)?;
            config::save_config_to(&cfg, path)?;
            if !global.quiet {
                eprintln!("Profile '{name}' written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_from(path)?;
            let out = output::render_single(global.output, &cfg, |c| summary(c, path))?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_from(path)?;
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: circlescope config init --server URL");
            } else {
                output::print_output(&profile_listing(&cfg), global.quiet);
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_from(path)?;
            set_default(&mut cfg, &name)?;
            config::save_config_to(&cfg, path)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

/// Add (or with `force`, replace) a profile and make it the default.
fn init_profile(cfg: &mut Config, name: &str, server: String, force: bool) -> Result<(), CliError> {
    if cfg.profiles.contains_key(name) && !force {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: format!("profile '{name}' already exists (use --force to replace it)"),
        });
    }

    let profile = Profile {
        server,
        ..Profile::default()
    };
    // Reject unusable origins before anything is written.
    config::profile_to_dashboard_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(name.to_owned(), profile);
    cfg.default_profile = Some(name.to_owned());
    Ok(())
}

fn set_default(cfg: &mut Config, name: &str) -> Result<(), CliError> {
    if !cfg.profiles.contains_key(name) {
        let names = cfg.profile_names();
        return Err(CliError::ProfileNotFound {
            name: name.to_owned(),
            available: if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            },
        });
    }
    cfg.default_profile = Some(name.to_owned());
    Ok(())
}

/// One name per line, `*` marking the default.
fn profile_listing(cfg: &Config) -> String {
    let default = cfg.active_profile_name(None);
    cfg.profile_names()
        .into_iter()
        .map(|name| {
            let marker = if name == default { " *" } else { "" };
            format!("{name}{marker}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summary(cfg: &Config, path: &Path) -> String {
    let mut lines = vec![
        ("File", path.display().to_string()),
        ("Default profile", cfg.active_profile_name(None)),
    ];
    let names = cfg.profile_names();
    lines.push((
        "Profiles",
        if names.is_empty() {
            "(none)".into()
        } else {
            names.join(", ")
        },
    ));
    for name in names {
        if let Ok(profile) = cfg.profile(name) {
            lines.push(("", format!("{name} -> {}", profile.server)));
        }
    }
    detail_lines(&lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::{ColorMode, OutputFormat};

    fn quiet() -> GlobalOpts {
        GlobalOpts {
            profile: None,
            server: None,
            output: OutputFormat::Table,
            color: ColorMode::Never,
            verbose: 0,
            quiet: true,
            insecure: false,
            timeout: None,
        }
    }

    fn init(name: &str, server: &str, force: bool) -> ConfigCommand {
        ConfigCommand::Init {
            server: server.into(),
            name: name.into(),
            force,
        }
    }

    #[test]
    fn init_then_use_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        handle_at(init("line3", "http://line-3.local:8000", false), &quiet(), &path).unwrap();
        handle_at(init("bench", "http://127.0.0.1:8000", false), &quiet(), &path).unwrap();

        let cfg = config::load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("bench"));
        assert_eq!(profile_listing(&cfg), "bench *\nline3");

        handle_at(ConfigCommand::Use { name: "line3".into() }, &quiet(), &path).unwrap();
        let cfg = config::load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("line3"));
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let mut cfg = Config::default();
        init_profile(&mut cfg, "line3", "http://a:8000".into(), false).unwrap();

        let err = init_profile(&mut cfg, "line3", "http://b:8000".into(), false).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));

        init_profile(&mut cfg, "line3", "http://b:8000".into(), true).unwrap();
        assert_eq!(cfg.profiles["line3"].server, "http://b:8000");
    }

    #[test]
    fn init_rejects_unusable_server() {
        let mut cfg = Config::default();
        assert!(init_profile(&mut cfg, "x", "not a url".into(), false).is_err());
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn use_unknown_profile_lists_available() {
        let mut cfg = Config::default();
        init_profile(&mut cfg, "line3", "http://a:8000".into(), false).unwrap();

        match set_default(&mut cfg, "line9").unwrap_err() {
            CliError::ProfileNotFound { available, .. } => assert_eq!(available, "line3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
