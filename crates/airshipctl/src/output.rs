//! Terminal output formatting
//!
//! Fixed-width tables with short ids and short locations; lifecycle
//! states are colorized so a fleet's health reads at a glance.

use std::io::{self, Write};

use airship_core::{
    AgentStatusRepresentation, CoordinatorStatusRepresentation, SlotStatusRepresentation,
};
use airship_coordinator::coordinator::TargetFailure;

/// ANSI color codes for terminal styling
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

fn state_color(state: &str) -> &'static str {
    match state {
        "RUNNING" | "ONLINE" => colors::GREEN,
        "STOPPED" | "OFFLINE" => colors::YELLOW,
        "RESTARTING" | "KILLING" | "PROVISIONING" => colors::CYAN,
        "TERMINATED" => colors::GRAY,
        _ => colors::RED,
    }
}

fn cell(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Print a slot status table
pub fn print_slots(slots: &[SlotStatusRepresentation]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if slots.is_empty() {
        let _ = writeln!(out, "no slots match");
        return;
    }

    let _ = writeln!(
        out,
        "{}{:<10} {:<12} {:<12} {:<22} {:<32} {:<26} {}{}",
        colors::BOLD,
        "uuid",
        "status",
        "expected",
        "location",
        "binary",
        "config",
        "message",
        colors::RESET,
    );
    for slot in slots {
        let _ = writeln!(
            out,
            "{:<10} {}{:<12}{} {:<12} {:<22} {:<32} {:<26} {}",
            slot.short_id,
            state_color(&slot.status),
            slot.status,
            colors::RESET,
            cell(slot.expected_status.as_deref()),
            slot.short_location,
            cell(slot.binary.as_deref()),
            cell(slot.config.as_deref()),
            cell(slot.status_message.as_deref()),
        );
    }
}

/// Print bulk command failures beneath the result table
pub fn print_failures(failures: &[TargetFailure]) {
    if failures.is_empty() {
        return;
    }
    let stderr = io::stderr();
    let mut out = stderr.lock();
    let _ = writeln!(
        out,
        "{}{} target(s) failed:{}",
        colors::RED,
        failures.len(),
        colors::RESET
    );
    for failure in failures {
        let _ = writeln!(out, "  {} {}{}{}", failure.target, colors::DIM, failure.error, colors::RESET);
    }
}

/// Print an agent status table
pub fn print_agents(agents: &[AgentStatusRepresentation]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if agents.is_empty() {
        let _ = writeln!(out, "no agents match");
        return;
    }

    let _ = writeln!(
        out,
        "{}{:<12} {:<14} {:<14} {:<22} {:<26} {:<15} {:<12} {}{}",
        colors::BOLD,
        "agent",
        "state",
        "machine",
        "location",
        "host",
        "ip",
        "type",
        "slots",
        colors::RESET,
    );
    for agent in agents {
        let _ = writeln!(
            out,
            "{:<12} {}{:<14}{} {:<14} {:<22} {:<26} {:<15} {:<12} {}",
            cell(agent.short_agent_id.as_deref()),
            state_color(&agent.state),
            agent.state,
            colors::RESET,
            agent.instance_id,
            cell(agent.short_location.as_deref()),
            cell(agent.internal_host.as_deref()),
            cell(agent.internal_ip.as_deref()),
            cell(agent.instance_type.as_deref()),
            agent.slots.len(),
        );
    }
}

/// Print a coordinator status table
pub fn print_coordinators(coordinators: &[CoordinatorStatusRepresentation]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if coordinators.is_empty() {
        let _ = writeln!(out, "no coordinators match");
        return;
    }

    let _ = writeln!(
        out,
        "{}{:<24} {:<14} {:<14} {:<22} {:<26} {}{}",
        colors::BOLD,
        "coordinator",
        "state",
        "machine",
        "location",
        "host",
        "type",
        colors::RESET,
    );
    for coordinator in coordinators {
        let _ = writeln!(
            out,
            "{:<24} {}{:<14}{} {:<14} {:<22} {:<26} {}",
            cell(coordinator.short_coordinator_id.as_deref()),
            state_color(&coordinator.state),
            coordinator.state,
            colors::RESET,
            coordinator.instance_id,
            cell(coordinator.short_location.as_deref()),
            cell(coordinator.internal_host.as_deref()),
            cell(coordinator.instance_type.as_deref()),
        );
    }
}
