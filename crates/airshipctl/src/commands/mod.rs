//! CLI verb implementations

pub mod serve;

use anyhow::{bail, Result};

use airship_core::{
    AirshipError, AssignmentRepresentation, SlotLifecycleState, UpgradeVersions,
};
use airship_coordinator::provision::ProvisioningRequest;

use crate::cli::Commands;
use crate::commander::Commander;
use crate::output;

/// Dispatch a parsed command against the commander
pub async fn execute(commander: &dyn Commander, command: &Commands, force: bool) -> Result<()> {
    match command {
        Commands::Show { filter, output: format } => {
            let (slots, _version) = commander.show_slots(&filter.to_builder()?).await?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&slots)?);
            } else {
                output::print_slots(&slots);
            }
            Ok(())
        }

        Commands::Install {
            binary,
            config,
            count,
            filter,
        } => {
            let assignment = AssignmentRepresentation {
                binary: binary.clone(),
                config: config.clone(),
            };
            let response = commander
                .install(&filter.to_builder()?, *count, assignment, force)
                .await?;
            output::print_slots(&response.slots);
            output::print_failures(&response.failures);
            Ok(())
        }

        Commands::Upgrade { versions, filter } => {
            let versions = parse_upgrade_versions(versions)?;
            let response = run_with_conflict_hint(
                commander
                    .upgrade(&filter.to_builder()?, &versions, force)
                    .await,
            )?;
            output::print_slots(&response.slots);
            output::print_failures(&response.failures);
            Ok(())
        }

        Commands::Start { filter } => {
            lifecycle(commander, filter, SlotLifecycleState::Running, force).await
        }
        Commands::Stop { filter } => {
            lifecycle(commander, filter, SlotLifecycleState::Stopped, force).await
        }
        Commands::Restart { filter } => {
            lifecycle(commander, filter, SlotLifecycleState::Restarting, force).await
        }

        Commands::Terminate { filter } => {
            let response =
                run_with_conflict_hint(commander.terminate(&filter.to_builder()?, force).await)?;
            output::print_slots(&response.slots);
            output::print_failures(&response.failures);
            Ok(())
        }

        Commands::ResetExpectedState { filter } => {
            let response = run_with_conflict_hint(
                commander
                    .reset_expected_state(&filter.to_builder()?, force)
                    .await,
            )?;
            output::print_slots(&response.slots);
            output::print_failures(&response.failures);
            Ok(())
        }

        Commands::Agent { command } => match command {
            crate::cli::AgentCommands::Show { filter, output: format } => {
                let agents = commander.show_agents(&filter.to_builder()?).await?;
                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&agents)?);
                } else {
                    output::print_agents(&agents);
                }
                Ok(())
            }
            crate::cli::AgentCommands::Provision {
                count,
                instance_type,
            } => {
                let request = ProvisioningRequest {
                    count: *count,
                    instance_type: instance_type.clone(),
                    ..Default::default()
                };
                let agents = commander.provision_agents(&request).await?;
                output::print_agents(&agents);
                Ok(())
            }
            crate::cli::AgentCommands::Terminate { agent_id } => {
                match commander.terminate_agent(agent_id).await? {
                    Some(agent) => {
                        output::print_agents(&[agent]);
                        Ok(())
                    }
                    None => bail!("unknown agent: {agent_id}"),
                }
            }
        },

        Commands::Coordinator { command } => match command {
            crate::cli::CoordinatorCommands::Show { output: format } => {
                let coordinators = commander.show_coordinators().await?;
                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&coordinators)?);
                } else {
                    output::print_coordinators(&coordinators);
                }
                Ok(())
            }
            crate::cli::CoordinatorCommands::Provision {
                count,
                instance_type,
            } => {
                let request = ProvisioningRequest {
                    count: *count,
                    instance_type: instance_type.clone(),
                    ..Default::default()
                };
                let coordinators = commander.provision_coordinators(&request).await?;
                output::print_coordinators(&coordinators);
                Ok(())
            }
        },

        Commands::Serve => unreachable!("serve is dispatched before commander creation"),
    }
}

async fn lifecycle(
    commander: &dyn Commander,
    filter: &crate::cli::SlotFilterArgs,
    state: SlotLifecycleState,
    force: bool,
) -> Result<()> {
    let response =
        run_with_conflict_hint(commander.set_state(&filter.to_builder()?, state, force).await)?;
    output::print_slots(&response.slots);
    output::print_failures(&response.failures);
    Ok(())
}

/// A version conflict is recoverable; tell the operator how
fn run_with_conflict_hint<T>(result: Result<T, AirshipError>) -> Result<T> {
    result.map_err(|error| match &error {
        AirshipError::VersionConflict { .. } => anyhow::anyhow!(
            "{error}\nthe fleet changed while this command was running; \
             re-run to retry against the current state, or pass --force to override"
        ),
        _ => error.into(),
    })
}

/// Positional upgrade versions: `@`-prefixed values target the config,
/// bare values target the binary
fn parse_upgrade_versions(versions: &[String]) -> Result<UpgradeVersions> {
    let mut upgrade = UpgradeVersions::default();
    for version in versions {
        if let Some(config_version) = version.strip_prefix('@') {
            if upgrade.config_version.is_some() {
                bail!("config version specified twice");
            }
            upgrade.config_version = Some(config_version.to_string());
        } else {
            if upgrade.binary_version.is_some() {
                bail!("binary version specified twice");
            }
            upgrade.binary_version = Some(version.clone());
        }
    }
    Ok(upgrade)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upgrade_versions() {
        let upgrade =
            parse_upgrade_versions(&["2.0".to_string(), "@2.0-beta".to_string()]).unwrap();
        assert_eq!(upgrade.binary_version.as_deref(), Some("2.0"));
        assert_eq!(upgrade.config_version.as_deref(), Some("2.0-beta"));

        let binary_only = parse_upgrade_versions(&["3.1".to_string()]).unwrap();
        assert_eq!(binary_only.binary_version.as_deref(), Some("3.1"));
        assert!(binary_only.config_version.is_none());
    }

    #[test]
    fn test_parse_upgrade_versions_rejects_duplicates() {
        assert!(parse_upgrade_versions(&["2.0".to_string(), "3.0".to_string()]).is_err());
        assert!(parse_upgrade_versions(&["@2.0".to_string(), "@3.0".to_string()]).is_err());
    }
}
