// FILE: src/cli/mod.rs

mod config;
mod handlers;

use crate::error::Result;
use crate::localization::{KeyScheme, LocalizationOptions};
use crate::{CompilerOptions, FileNamingScheme, StyleScheme, TargetPlatform};
use clap::{Arg, ArgAction, Command, ValueEnum};
use std::time::Instant;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Platform {
    React,
    Nextjs,
    Gatsby,
    Tanstack,
}

impl From<Platform> for TargetPlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::React => TargetPlatform::React,
            Platform::Nextjs => TargetPlatform::NextJs,
            Platform::Gatsby => TargetPlatform::Gatsby,
            Platform::Tanstack => TargetPlatform::Tanstack,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StyleSchemeArg {
    Plain,
    Scoped,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FileNamingArg {
    Readable,
    OpaqueId,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KeySchemeArg {
    Content,
    Hash,
    Path,
}

pub struct EnhancedCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"))?;

        let result = match matches.subcommand() {
            Some(("compile", sub_matches)) => handlers::handle_compile_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        };
        log::debug!("Finished in {}ms", self.start_time.elapsed().as_millis());
        result
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Designc Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path (.json or .toml)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("compile")
                    .about("Compile components of a design model to React modules")
                    .arg(Arg::new("input").help("Design model JSON file").required(true).index(1))
                    .arg(Arg::new("component").long("component").value_name("NAME|UUID").help("Component to compile").conflicts_with("all"))
                    .arg(Arg::new("all").long("all").help("Compile every component in the model").action(ArgAction::SetTrue))
                    .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write the JSON output to a file instead of stdout"))
                    .arg(Arg::new("out-dir").long("out-dir").value_name("DIR").help("Write generated modules and stylesheets into a directory"))
                    .arg(Arg::new("platform").short('p').long("platform").value_parser(clap::value_parser!(Platform)).help("Target platform"))
                    .arg(Arg::new("style-scheme").long("style-scheme").value_parser(clap::value_parser!(StyleSchemeArg)).help("Stylesheet scheme"))
                    .arg(Arg::new("file-naming").long("file-naming").value_parser(clap::value_parser!(FileNamingArg)).help("Generated file naming scheme"))
                    .arg(Arg::new("localize").long("localize").value_parser(clap::value_parser!(KeySchemeArg)).help("Route localizable text through the translator"))
                    .arg(Arg::new("short-ids").long("short-ids").help("Use short class identifiers").action(ArgAction::SetTrue))
                    .arg(Arg::new("force-internal").long("force-internal").help("Expose internal and tools-only props").action(ArgAction::SetTrue))
                    .arg(Arg::new("no-skeleton").long("no-skeleton").help("Skip skeleton modules").action(ArgAction::SetTrue))
                    .arg(Arg::new("debug").short('d').long("debug").help("Enable debug mode with phase logging").action(ArgAction::SetTrue))
                    .arg(Arg::new("stats").long("stats").help("Show compilation statistics").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("check")
                    .about("Validate design models without emitting code")
                    .arg(Arg::new("input").help("Model file or directory").required(true).index(1))
                    .arg(Arg::new("recursive").short('r').long("recursive").help("Check all model files in directory recursively").action(ArgAction::SetTrue)),
            )
    }

    fn setup_logging(&self, verbose_count: u8) -> Result<()> {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
        Ok(())
    }

    /// Config file values first, then explicit flags on top.
    pub fn build_compiler_options(&self, matches: &clap::ArgMatches) -> Result<CompilerOptions> {
        let mut options = CompilerOptions::default();
        self.config.apply(&mut options)?;

        if let Some(platform) = matches.get_one::<Platform>("platform") {
            options.target_platform = (*platform).into();
        }
        if let Some(scheme) = matches.get_one::<StyleSchemeArg>("style-scheme") {
            options.style_scheme = match scheme {
                StyleSchemeArg::Plain => StyleScheme::Plain,
                StyleSchemeArg::Scoped => StyleScheme::Scoped,
            };
        }
        if let Some(naming) = matches.get_one::<FileNamingArg>("file-naming") {
            options.file_naming = match naming {
                FileNamingArg::Readable => FileNamingScheme::Readable,
                FileNamingArg::OpaqueId => FileNamingScheme::OpaqueId,
            };
        }
        if let Some(scheme) = matches.get_one::<KeySchemeArg>("localize") {
            let key_scheme = match scheme {
                KeySchemeArg::Content => KeyScheme::Content,
                KeySchemeArg::Hash => KeyScheme::Hash,
                KeySchemeArg::Path => KeyScheme::Path,
            };
            let tag_prefix = options.localization.take().and_then(|l| l.tag_prefix);
            options.localization = Some(LocalizationOptions { key_scheme, tag_prefix });
        }

        options.debug_mode |= matches.get_flag("debug");
        options.use_short_identifiers |= matches.get_flag("short-ids");
        options.force_include_internal_props |= matches.get_flag("force-internal");
        if matches.get_flag("no-skeleton") {
            options.emit_skeleton = false;
        }
        Ok(options)
    }

    pub(crate) fn output_directory(&self) -> Option<&str> {
        self.config.output_directory.as_deref()
    }
}
