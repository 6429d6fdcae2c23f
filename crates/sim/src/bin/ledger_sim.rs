//! interactive simulation for the Tessera ledger

use std::net::SocketAddr;

use anyhow::Result;
use colored::Colorize;
use tessera_sim::{scenarios, WorkloadPresets};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("{}", "Tessera Ledger Simulation".bright_blue().bold());
    println!("{}", "=========================".bright_blue());
    println!();

    scenarios::walkthrough();
    scenarios::acceptance_demo();

    let workloads = vec![
        ("Light Traffic", WorkloadPresets::light_traffic()),
        ("Mixed Traffic", WorkloadPresets::mixed_traffic()),
        ("Adversarial Traffic", WorkloadPresets::adversarial_traffic()),
    ];

    for (name, config) in workloads {
        println!(
            "{}",
            format!("\n>>> Workload: {}", name).bright_green().bold()
        );
        println!("Accounts: {}", config.accounts);
        println!("Token classes: {}", config.token_classes);
        println!("Hostile receivers: {}", config.hostile_receivers);
        println!();

        scenarios::churn_test(&config);

        println!("{}", "Workload complete!".bright_yellow());
        println!("{}", "-".repeat(50));
    }

    println!(
        "{}",
        "\n>>> Live session with query API".bright_red().bold()
    );
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Browse http://{}/events or subscribe to /ws; ctrl-c to stop", addr);

    scenarios::live_session(addr, WorkloadPresets::mixed_traffic()).await;

    println!("\n{}", "All simulations complete!".bright_green().bold());
    Ok(())
}
