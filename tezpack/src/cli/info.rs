// tezpack/src/cli/info.rs
use clap::Args;
use colored::Colorize;
use tezpack_common::config::Config;
use tezpack_common::error::Result;
use tezpack_common::Formulary;
use tezpack_core::receipt;

#[derive(Debug, Args)]
pub struct InfoArgs {
    name: String,
}

impl InfoArgs {
    pub fn run(&self, config: &Config) -> Result<()> {
        let formula = Formulary::new().load_formula(&self.name)?;

        println!(
            "{} {}",
            formula.name.bold(),
            formula.version_str_full()
        );
        if let Some(desc) = &formula.desc {
            println!("{desc}");
        }
        if let Some(homepage) = &formula.homepage {
            println!("{homepage}");
        }
        println!("From: {} (tag {})", formula.source.url, formula.source.tag);
        println!(
            "Toolchains: rust {}, opam {}",
            formula.toolchain.rust, formula.toolchain.opam
        );

        let build_deps: Vec<&str> = formula
            .build_dependencies()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        if !build_deps.is_empty() {
            println!("Build dependencies: {}", build_deps.join(", "));
        }
        let runtime_deps: Vec<&str> = formula
            .runtime_dependencies()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        if !runtime_deps.is_empty() {
            println!("Dependencies: {}", runtime_deps.join(", "));
        }

        println!("Binaries:");
        for target in &formula.targets {
            println!("    {}", target.installed_name);
        }

        if !formula.bottle.files.is_empty() {
            let mut tags: Vec<&str> = formula.bottle.files.keys().map(String::as_str).collect();
            tags.sort();
            println!("Bottles: {}", tags.join(", "));
        }

        if let Some(service) = &formula.service {
            println!(
                "Service: runs {} (keep-alive: {}, requires root: {})",
                service.run, service.keep_alive, service.require_root
            );
        }

        match receipt::load_receipt(&formula.name, config)? {
            Some(installed) => println!(
                "{} {} installed",
                "Installed:".bold(),
                installed.version
            ),
            None => println!("Not installed"),
        }

        Ok(())
    }
}
