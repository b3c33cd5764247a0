//! Thermostat State Machine
//!
//! This example drives a small hierarchical thermostat from live sensor values.
//!
//! Key concepts:
//! - Nested states (HEATING and COOLING live under ACTIVE)
//! - Duration-qualified conditions (heat only after it stays cold)
//! - Edge-triggered synthetic events with automatic `_RESET`
//! - State timeouts as a safety net
//!
//! Run with: RUST_LOG=statewire=debug cargo run --example thermostat

use statewire::builder::{DefinitionBuilder, EventBuilder, TransitionBuilder};
use statewire::core::Condition;
use statewire::{FiniteStateMachine, StateInfo, STATE_TIMEOUT_EVENT};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== Thermostat State Machine ===\n");

    let definition = DefinitionBuilder::new()
        .state("IDLE")
        .state("ACTIVE")
        .child("HEATING", "ACTIVE")
        .state_info(
            StateInfo::new("COOLING")
                .with_parent("ACTIVE")
                .with_timeout(Duration::from_millis(800)),
        )
        .initial("IDLE")
        .event(
            EventBuilder::new("too_hot")
                .edge()
                .when(Condition::new("temperature", 26, 60)),
        )?
        .transition(
            TransitionBuilder::new()
                .from("IDLE")
                .to("HEATING")
                .when(Condition::new("temperature", -20, 17).sustained_for(Duration::from_millis(300))),
        )?
        .transition(TransitionBuilder::new().from("IDLE").to("COOLING").on("too_hot"))?
        .transition(TransitionBuilder::new().from("COOLING").to("IDLE").on("too_hot_RESET"))?
        .transition(
            TransitionBuilder::new()
                .from("HEATING")
                .to("IDLE")
                .when(Condition::new("temperature", 20, 60)),
        )?
        .transition(
            TransitionBuilder::new()
                .from("ACTIVE")
                .to("IDLE")
                .on(STATE_TIMEOUT_EVENT),
        )?
        .build()?;

    let machine = FiniteStateMachine::new("thermostat");
    machine.init(&definition)?;
    machine.set_transition_callback(|exited, event, entered| {
        println!("  {} : exit {:?} -> enter {:?}", event.name(), exited, entered);
    })?;
    machine.start()?;

    println!("Initial state: {:?}\n", machine.current_state());

    let readings = [(15, 500), (21, 200), (30, 200), (22, 200), (31, 1200)];
    for (temperature, hold_ms) in readings {
        println!("temperature = {}", temperature);
        machine.set_condition_value("temperature", temperature);
        thread::sleep(Duration::from_millis(hold_ms));
        println!("  state: {:?}", machine.current_state());
    }

    machine.stop();

    println!("\nVisited: {:?}", machine.history().path());
    println!("\n=== Example Complete ===");
    Ok(())
}
