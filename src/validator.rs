use log::debug;

use crate::error::{CiQueryError, Result};
use crate::models::{Attribute, Environment, System};
use crate::query::QueryArgs;

/// Filters the loaded configuration down to what the user asked for.
///
/// Validation runs in stages: first the requested names are checked against
/// the configuration, then inconsistent systems are dropped, then disabled
/// ones, then systems whose sources the user ruled out. Each stage that
/// empties the configuration raises its own typed error, so the user learns
/// which filter went too far and what the configuration had to offer.
pub struct Validator<'a> {
    args: &'a QueryArgs,
}

impl<'a> Validator<'a> {
    pub fn new(args: &'a QueryArgs) -> Self {
        Self { args }
    }

    /// Returns the environments that survive every filtering stage.
    ///
    /// Systems kept only because the user named them via `--systems` are
    /// enabled on the way, overriding the configuration.
    ///
    /// # Errors
    ///
    /// * [`CiQueryError::InvalidEnvironment`] when `--env-name` names an
    ///   unknown environment.
    /// * [`CiQueryError::InvalidSystem`] when `--systems` names an unknown
    ///   system.
    /// * [`CiQueryError::NoValidSystem`] when no system is consistent with
    ///   the name and type filters.
    /// * [`CiQueryError::NoEnabledSystem`] when every surviving system is
    ///   disabled.
    /// * [`CiQueryError::NoValidSources`] when no surviving system has a
    ///   source the user accepts.
    pub fn validate_environments(
        &self,
        environments: Vec<Environment>,
    ) -> Result<Vec<Environment>> {
        // Record every name up front: the typed errors report what the
        // whole configuration had to offer, not what survived filtering.
        let mut all_env_names = Vec::new();
        let mut all_system_names = Vec::new();
        let mut all_source_names = Vec::new();
        for env in &environments {
            all_env_names.push(env.name.clone());
            for system in &env.systems {
                all_system_names.push(system.name.clone());
                for source in &system.sources {
                    all_source_names.push(source.name.clone());
                }
            }
        }

        check_requested_names(
            &self.args.env_name,
            &all_env_names,
            CiQueryError::InvalidEnvironment,
        )?;
        check_requested_names(
            &self.args.systems,
            &all_system_names,
            CiQueryError::InvalidSystem,
        )?;

        let environments = check_envs(
            environments,
            |system| self.consistent_system(system),
            |env| self.consistent_environment(env),
            "not consistent with user input",
            "not consistent with user input",
        );
        if environments.is_empty() {
            return Err(CiQueryError::NoValidSystem {
                systems: all_system_names,
            });
        }

        let mut environments = environments;
        self.override_enabled_systems(&mut environments);

        let environments = check_envs(
            environments,
            |system| system.is_enabled(),
            |_| true,
            "disabled in the configuration",
            "",
        );
        if environments.is_empty() {
            return Err(CiQueryError::NoEnabledSystem);
        }

        let environments = check_envs(
            environments,
            |system| self.system_has_valid_sources(system),
            |_| true,
            "has no sources consistent with user input",
            "",
        );
        if environments.is_empty() {
            return Err(CiQueryError::NoValidSources {
                sources: all_source_names,
            });
        }

        Ok(environments)
    }

    fn consistent_environment(&self, env: &Environment) -> bool {
        match &self.args.env_name.value {
            Some(names) => names.contains(&env.name),
            None => true,
        }
    }

    fn consistent_system(&self, system: &System) -> bool {
        if let Some(types) = &self.args.system_type.value {
            if !types.contains(&system.system_type) {
                return false;
            }
        }

        if let Some(names) = &self.args.systems.value {
            if !names.contains(&system.name) {
                return false;
            }
        }

        true
    }

    /// Disables the sources the user did not ask for and tells whether the
    /// system keeps any source at all.
    fn system_has_valid_sources(&self, system: &mut System) -> bool {
        let Some(user_sources) = &self.args.sources.value else {
            return true;
        };

        let mut found = false;
        for source in &mut system.sources {
            if user_sources.contains(&source.name) {
                found = true;
            } else {
                debug!(
                    "Source '{}' of system '{}' is not requested, disabling it",
                    source.name, system.name
                );
                source.disable();
            }
        }

        found
    }

    /// Systems the user named with `--systems` take part in the query even
    /// when the configuration disabled them.
    fn override_enabled_systems(&self, environments: &mut [Environment]) {
        let Some(user_systems) = &self.args.systems.value else {
            return;
        };

        for env in environments.iter_mut() {
            for system in &mut env.systems {
                if user_systems.contains(&system.name) {
                    debug!("System '{}' was requested by name, enabling it", system.name);
                    system.enable();
                }
            }
        }
    }
}

/// Applies a check to every environment and every system, keeping only
/// those that pass. An environment with no surviving system is dropped.
fn check_envs<S, E>(
    mut environments: Vec<Environment>,
    mut system_check: S,
    mut env_check: E,
    system_reason: &str,
    env_reason: &str,
) -> Vec<Environment>
where
    S: FnMut(&mut System) -> bool,
    E: FnMut(&Environment) -> bool,
{
    environments.retain_mut(|env| {
        if !env_check(env) {
            debug!("Environment '{}' skipped: {}", env.name, env_reason);
            return false;
        }

        env.systems.retain_mut(|system| {
            if system_check(system) {
                return true;
            }
            debug!("System '{}' skipped: {}", system.name, system_reason);
            false
        });

        !env.systems.is_empty()
    });

    environments
}

fn check_requested_names(
    requested: &Attribute<Vec<String>>,
    known: &[String],
    to_error: impl Fn(String) -> CiQueryError,
) -> Result<()> {
    if let Some(names) = &requested.value {
        for name in names {
            if !known.contains(name) {
                return Err(to_error(name.clone()));
            }
        }
    }

    Ok(())
}
