// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod cli;
mod config;
mod console;
mod ui;

use chrono::Local;
use cspace_report::images::{CancelToken, ImageResolver};
use cspace_report::report::{self, ReportMode};
use cspace_report::types::parse_records;
use std::fs;

fn main() {
    env_logger::init();

    // Parse CLI arguments
    let args = cli::CliArgs::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        ui::print_error(&e);
        std::process::exit(1);
    }

    // Set console width override if specified (for testing)
    if let Some(width) = args.console_width {
        console::set_console_width(width);
    }

    // Resolve configuration up front
    let mut plan = match config::build_report_plan(&args) {
        Ok(p) => p,
        Err(e) => {
            ui::print_error(&format!("Configuration error: {}", e));
            std::process::exit(1);
        }
    };

    // Load records
    let records = match fs::read_to_string(&plan.input)
        .map_err(|e| format!("Failed to read {}: {}", plan.input.display(), e))
        .and_then(|text| parse_records(&text))
    {
        Ok(r) => r,
        Err(e) => {
            ui::print_error(&e);
            std::process::exit(1);
        }
    };
    ui::status(&format!("loaded {} work orders from {}", records.len(), plan.input.display()));

    // The footer timestamp and the filename must agree
    let generated_at = Local::now();
    plan.options = plan.options.with_generated_at(generated_at);

    if plan.options.include_images && plan.options.mode != ReportMode::Summary {
        match plan.images.proxy_url {
            Some(ref proxy) => ui::status(&format!("loading images via {}", proxy)),
            None => ui::status("loading images directly (no proxy configured)"),
        }
    }

    let resolver = ImageResolver::new(plan.images.clone());
    let output = match report::build_report(&records, &plan.options, &resolver, &CancelToken::new()) {
        Ok(o) => o,
        Err(e) => {
            ui::print_error(&format!("{} failed: {}", e.stage(), e));
            std::process::exit(1);
        }
    };

    let path = report::output_path(&plan.output_dir, plan.output.as_deref(), plan.options.mode, generated_at);
    if let Err(e) = report::write_report(&output, &path) {
        ui::print_error(&format!("{} failed: {}", e.stage(), e));
        std::process::exit(1);
    }
    ui::status_marked("wrote", term::color::BRIGHT_GREEN, &path.display().to_string());

    if plan.write_manifest {
        match report::write_json_manifest(&output, &path) {
            Ok(manifest) => ui::status(&format!("manifest saved to {}", manifest.display())),
            Err(e) => ui::print_warning(&format!("Failed to save JSON manifest: {}", e)),
        }
    }

    // Console summary
    if output.mode == ReportMode::Summary {
        console::print_summary_rows(plan.options.group_by.label(), &output.summary_rows);
    } else {
        console::print_entry_table(&output.entries);
    }
    console::print_summary_block(&output, &path);

    let images = output.images();
    if images.failed() > 0 {
        ui::print_warning(&format!("{} image(s) could not be loaded and were replaced by placeholders", images.failed()));
    }
}
