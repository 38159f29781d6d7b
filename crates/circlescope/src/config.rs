//! CLI-side configuration resolution: profile + global flag overrides,
//! translated to `circlescope_core::DashboardConfig`.

use circlescope_config::{Config, Profile};
use circlescope_core::DashboardConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Build a `DashboardConfig` from the config file, profile, and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let cfg = circlescope_config::load_config()?;
    resolve_with(&cfg, global)
}

/// Resolution against an already-loaded config.
///
/// Flag > environment > profile > `[defaults]`. Without a matching profile
/// the server must come from `--server`; naming a missing profile
/// explicitly is an error.
pub fn resolve_with(cfg: &Config, global: &GlobalOpts) -> Result<DashboardConfig, CliError> {
    let profile_name = cfg.active_profile_name(global.profile.as_deref());

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let names = cfg.profile_names();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if profile.server.is_empty() {
        return Err(CliError::NoConfig {
            path: circlescope_config::config_path().display().to_string(),
        });
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok(circlescope_config::profile_to_dashboard_config(
        &profile,
        &cfg.defaults,
    )?)
}
