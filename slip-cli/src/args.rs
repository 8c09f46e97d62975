//! Simple command-line argument parser.
//!
//! No external dependencies. Supports `--flag`, `--key value`, `--key=value`,
//! `-v`/`-q` (counted), `-c PATH` style short options and positional
//! arguments.

use std::collections::HashMap;

/// Parsed command-line arguments.
pub struct Args {
    pub flags: HashMap<String, String>,
    pub positional: Vec<String>,
    pub verbosity: u8,
    pub quiet: u8,
}

impl Args {
    /// Parse command-line arguments (skipping argv[0]).
    pub fn parse() -> Self {
        Self::parse_from(std::env::args().skip(1).collect())
    }

    /// Parse from a list of argument strings.
    pub fn parse_from(args: Vec<String>) -> Self {
        let mut flags = HashMap::new();
        let mut positional = Vec::new();
        let mut verbosity: u8 = 0;
        let mut quiet: u8 = 0;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            if arg == "--" {
                positional.extend(iter);
                break;
            } else if let Some(key) = arg.strip_prefix("--") {
                if let Some((k, v)) = key.split_once('=') {
                    flags.insert(k.to_string(), v.to_string());
                    continue;
                }
                match key {
                    "version" | "help" | "exampleconfig" | "flow-control" => {
                        flags.insert(key.to_string(), "true".into());
                    }
                    _ => {
                        let val = iter.next().unwrap_or_else(|| "true".into());
                        flags.insert(key.to_string(), val);
                    }
                }
            } else if arg.starts_with('-') && arg.len() > 1 {
                let chars: Vec<char> = arg[1..].chars().collect();
                for &c in &chars {
                    match c {
                        'v' => verbosity = verbosity.saturating_add(1),
                        'q' => quiet = quiet.saturating_add(1),
                        'h' => {
                            flags.insert("h".into(), "true".into());
                        }
                        _ => {
                            // A lone short option may take the next argument
                            let next_is_value = chars.len() == 1
                                && iter
                                    .as_slice()
                                    .first()
                                    .map(|s| !s.starts_with('-'))
                                    .unwrap_or(false);
                            let val = if next_is_value { iter.next() } else { None };
                            flags.insert(c.to_string(), val.unwrap_or_else(|| "true".into()));
                        }
                    }
                }
            } else {
                positional.push(arg);
            }
        }

        Args {
            flags,
            positional,
            verbosity,
            quiet,
        }
    }

    /// Get a flag value by long or short name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(|s| s.as_str())
    }

    /// Check if a flag is set.
    pub fn has(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }

    /// Get config path from --config or -c flag.
    pub fn config_path(&self) -> Option<&str> {
        self.get("config").or_else(|| self.get("c"))
    }

    /// Serial device from --port or -p.
    pub fn port(&self) -> Option<&str> {
        self.get("port").or_else(|| self.get("p"))
    }

    /// Log level chosen with -v/-q, if either was given.
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        if self.quiet > 0 {
            return Some(match self.quiet {
                1 => log::LevelFilter::Warn,
                _ => log::LevelFilter::Error,
            });
        }
        match self.verbosity {
            0 => None,
            1 => Some(log::LevelFilter::Debug),
            _ => Some(log::LevelFilter::Trace),
        }
    }
}
