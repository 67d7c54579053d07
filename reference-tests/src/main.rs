//! Reference test binary entry point
//!
//! Runs every droplet reference scenario and prints a summary.

use reference_tests::scenarios::{
    carreau_versus_newtonian, cavity_filling, contact_angle_sign_rule, flat_resting_spreading,
};
use reference_tests::TestResult;

type Outcome = Result<TestResult, Box<dyn std::error::Error>>;

fn flat_substrate() -> Outcome {
    Ok(flat_resting_spreading()?.run()?)
}

fn cavity() -> Outcome {
    Ok(cavity_filling()?.run()?)
}

fn carreau() -> Outcome {
    Ok(carreau_versus_newtonian()?.run()?)
}

fn sign_rule() -> Outcome {
    Ok(contact_angle_sign_rule()?.run()?)
}

/// Get all reference tests
fn all_tests() -> Vec<(&'static str, fn() -> Outcome)> {
    let tests: [(&'static str, fn() -> Outcome); 4] = [
        ("Flat Substrate Spreading", flat_substrate),
        ("Cavity Filling", cavity),
        ("Carreau Versus Newtonian", carreau),
        ("Contact Angle Sign Rule", sign_rule),
    ];
    tests.to_vec()
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("Droplet Reference Test Suite");
    tracing::info!("============================");

    let tests = all_tests();
    tracing::info!("Found {} reference tests", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    for (name, run) in tests {
        match run() {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running test {}: {}", name, e);
                failed_count += 1;
            }
        }
    }

    // Print overall summary
    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", results.len());
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    if failed_count > 0 {
        std::process::exit(1);
    }
}
