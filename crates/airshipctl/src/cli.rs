//! Command-line interface definition

use clap::{Args, Parser, Subcommand};

/// Airship CLI - deploy and manage versioned binaries across a fleet
#[derive(Parser, Debug)]
#[command(name = "airshipctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Coordinator URL for remote commands
    #[arg(long, global = true, env = "AIRSHIP_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Coordinator config file for local (in-process) commands
    #[arg(long = "config", global = true, env = "AIRSHIP_CONFIG")]
    pub config_file: Option<String>,

    /// Skip the optimistic-concurrency version check
    #[arg(long, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Slot selection flags; each maps onto one filter criterion
#[derive(Args, Debug, Default, Clone)]
pub struct SlotFilterArgs {
    /// Select slots by UUID or unique UUID prefix
    #[arg(short = 'u', long = "uuid")]
    pub uuid: Vec<String>,

    /// Exclude slots by UUID or unique UUID prefix
    #[arg(long = "not-uuid")]
    pub not_uuid: Vec<String>,

    /// Select slots by lifecycle state (full name or shortcode)
    #[arg(short = 's', long = "state")]
    pub state: Vec<String>,

    /// Exclude slots by lifecycle state
    #[arg(long = "not-state")]
    pub not_state: Vec<String>,

    /// Select slots by host glob
    #[arg(short = 'H', long = "host")]
    pub host: Vec<String>,

    /// Exclude slots by host glob
    #[arg(long = "not-host")]
    pub not_host: Vec<String>,

    /// Select slots by machine (instance id) glob
    #[arg(short = 'm', long = "machine")]
    pub machine: Vec<String>,

    /// Exclude slots by machine glob
    #[arg(long = "not-machine")]
    pub not_machine: Vec<String>,

    /// Select slots whose binary spec contains the glob
    #[arg(short = 'b', long = "binary")]
    pub binary: Vec<String>,

    /// Exclude slots whose binary spec contains the glob
    #[arg(long = "not-binary")]
    pub not_binary: Vec<String>,

    /// Select slots whose config spec contains the glob
    #[arg(short = 'c', long = "config-spec")]
    pub config: Vec<String>,

    /// Exclude slots whose config spec contains the glob
    #[arg(long = "not-config-spec")]
    pub not_config: Vec<String>,

    /// Select every slot
    #[arg(long)]
    pub all: bool,
}

/// Agent selection flags
#[derive(Args, Debug, Default, Clone)]
pub struct AgentFilterArgs {
    /// Select agents by id or unique id prefix
    #[arg(short = 'u', long = "uuid")]
    pub uuid: Vec<String>,

    /// Exclude agents by id or unique id prefix
    #[arg(long = "not-uuid")]
    pub not_uuid: Vec<String>,

    /// Select agents by lifecycle state
    #[arg(short = 's', long = "state")]
    pub state: Vec<String>,

    /// Exclude agents by lifecycle state
    #[arg(long = "not-state")]
    pub not_state: Vec<String>,

    /// Select agents by host glob
    #[arg(short = 'H', long = "host")]
    pub host: Vec<String>,

    /// Exclude agents by host glob
    #[arg(long = "not-host")]
    pub not_host: Vec<String>,

    /// Select agents by machine (instance id) glob
    #[arg(short = 'm', long = "machine")]
    pub machine: Vec<String>,

    /// Exclude agents by machine glob
    #[arg(long = "not-machine")]
    pub not_machine: Vec<String>,

    /// Select agents hosting a slot with this UUID prefix
    #[arg(long = "slot-uuid")]
    pub slot_uuid: Vec<String>,

    /// Exclude agents hosting a slot with this UUID prefix
    #[arg(long = "not-slot-uuid")]
    pub not_slot_uuid: Vec<String>,

    /// Select every agent
    #[arg(long)]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show slot status
    Show {
        #[command(flatten)]
        filter: SlotFilterArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Install a binary + config into new slots
    Install {
        /// Binary spec, e.g. food.fruit:apple:1.0
        binary: String,

        /// Config spec, e.g. @prod:apple:1.0
        config: String,

        /// Number of slots to install
        #[arg(long, default_value_t = 1)]
        count: usize,

        #[command(flatten)]
        filter: AgentFilterArgs,
    },

    /// Upgrade matching slots to new binary/config versions
    Upgrade {
        /// Target versions: a binary version and/or an @-prefixed config version
        #[arg(required = true)]
        versions: Vec<String>,

        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Start matching slots
    Start {
        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Stop matching slots
    Stop {
        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Restart matching slots
    Restart {
        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Terminate matching slots
    Terminate {
        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Accept each matching slot's actual state as its expected state
    ResetExpectedState {
        #[command(flatten)]
        filter: SlotFilterArgs,
    },

    /// Agent management
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Coordinator management
    Coordinator {
        #[command(subcommand)]
        command: CoordinatorCommands,
    },

    /// Run the coordinator HTTP API (uses the global --config file)
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Show agent status
    Show {
        #[command(flatten)]
        filter: AgentFilterArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Provision new agent instances
    Provision {
        /// Number of agents to provision
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Instance type
        #[arg(long)]
        instance_type: Option<String>,
    },

    /// Terminate an agent (must have no slots)
    Terminate {
        /// Agent id
        agent_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CoordinatorCommands {
    /// Show coordinator status
    Show {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Provision new coordinator instances
    Provision {
        /// Number of coordinators to provision
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Instance type
        #[arg(long)]
        instance_type: Option<String>,
    },
}

impl SlotFilterArgs {
    /// Translate the flags into a filter builder
    pub fn to_builder(
        &self,
    ) -> airship_core::AirshipResult<airship_coordinator::SlotFilterBuilder> {
        let mut builder = airship_coordinator::SlotFilterBuilder::new();
        for value in &self.uuid {
            builder.add_slot_uuid_filter(value);
        }
        for value in &self.not_uuid {
            builder.add_not_slot_uuid_filter(value);
        }
        for value in &self.state {
            builder.add_state_filter(value)?;
        }
        for value in &self.not_state {
            builder.add_not_state_filter(value)?;
        }
        for value in &self.host {
            builder.add_host_glob_filter(value);
        }
        for value in &self.not_host {
            builder.add_not_host_glob_filter(value);
        }
        for value in &self.machine {
            builder.add_machine_glob_filter(value);
        }
        for value in &self.not_machine {
            builder.add_not_machine_glob_filter(value);
        }
        for value in &self.binary {
            builder.add_binary_glob_filter(value);
        }
        for value in &self.not_binary {
            builder.add_not_binary_glob_filter(value);
        }
        for value in &self.config {
            builder.add_config_glob_filter(value);
        }
        for value in &self.not_config {
            builder.add_not_config_glob_filter(value);
        }
        if self.all {
            builder.select_all();
        }
        Ok(builder)
    }
}

impl AgentFilterArgs {
    pub fn to_builder(
        &self,
    ) -> airship_core::AirshipResult<airship_coordinator::AgentFilterBuilder> {
        let mut builder = airship_coordinator::AgentFilterBuilder::new();
        for value in &self.uuid {
            builder.add_uuid_filter(value);
        }
        for value in &self.not_uuid {
            builder.add_not_uuid_filter(value);
        }
        for value in &self.state {
            builder.add_state_filter(value)?;
        }
        for value in &self.not_state {
            builder.add_not_state_filter(value)?;
        }
        for value in &self.host {
            builder.add_host_glob_filter(value);
        }
        for value in &self.not_host {
            builder.add_not_host_glob_filter(value);
        }
        for value in &self.machine {
            builder.add_machine_glob_filter(value);
        }
        for value in &self.not_machine {
            builder.add_not_machine_glob_filter(value);
        }
        for value in &self.slot_uuid {
            builder.add_slot_uuid_filter(value);
        }
        for value in &self.not_slot_uuid {
            builder.add_not_slot_uuid_filter(value);
        }
        if self.all {
            builder.select_all();
        }
        Ok(builder)
    }
}
