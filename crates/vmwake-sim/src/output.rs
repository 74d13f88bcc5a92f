//! Output formatting for simulation results

use anyhow::Error;
use colored::Colorize;
use serde_json::json;

use crate::config::SimConfig;
use crate::simulation::SimReport;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print a simulation report
pub fn print_report(report: &SimReport, json: bool) {
    if json {
        let output = json!({
            "success": true,
            "report": report,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format report as JSON: {e}"),
        }
        return;
    }

    println!("{}", "Simulation complete".green().bold());
    println!("  Tick rate:          {} Hz", report.tick_rate_hz);
    println!("  Threads resumed:    {}", report.threads_resumed);
    println!("  Idle cycles:        {}", report.idle_cycles);
    println!("  Early resumes:      {}", report.early_resumes);
    println!("  Max lateness:       {} ms", report.max_lateness_ms);
    println!("  External wakes:     {}", report.external_wakes_sent);
    println!("  Elapsed:            {} ms", report.elapsed_ms);

    let counters = &report.counters;
    println!("{}", "Bridge counters".cyan().bold());
    println!("  Timer arms:         {}", counters.arms);
    println!("  Timer stops:        {}", counters.stops);
    println!("  Kept arms:          {}", counters.keeps);
    println!("  Timer expiries:     {}", counters.timer_notifications);
    println!("  Immediate:          {}", counters.immediate_notifications);
    println!("  Stale expiries:     {}", counters.stale_fires);
    println!("  Wakeups:            {}", counters.wakeups);
    if counters.failures > 0 {
        println!("  {}           {}", "Failures:".red(), counters.failures);
    }
}

/// Print the effective configuration
pub fn print_config(config: &SimConfig) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
