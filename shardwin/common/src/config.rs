// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Runtime configuration, via [`ConfigOptions`]

use std::collections::HashMap;
use std::fmt::Display;

use log::debug;

use crate::{Result, ShardwinError};

/// A macro that wraps a configuration struct and automatically derives
/// [`Default`] and [`ConfigField`] for it, allowing it to be used
/// in the [`ConfigOptions`] configuration tree
///
/// For example,
///
/// ```ignore
/// config_namespace! {
///    /// Amazing config
///    pub struct MyConfig {
///        /// Field 1 doc
///        field1: String, default = "".to_string()
///
///        /// Field 2 doc
///        field2: usize, default = 232
///
///        /// Field 3 doc
///        field3: Option<usize>, default = None
///    }
///}
/// ```
///
/// NB: Misplaced commas may result in nonsensical errors
///
macro_rules! config_namespace {
    (
     $(#[doc = $struct_d:tt])*
     $vis:vis struct $struct_name:ident {
        $(
        $(#[doc = $d:tt])*
        $field_vis:vis $field_name:ident : $field_type:ty, default = $default:expr
        )*$(,)*
    }
    ) => {

        $(#[doc = $struct_d])*
        #[derive(Debug, Clone, PartialEq)]
        #[non_exhaustive]
        $vis struct $struct_name{
            $(
            $(#[doc = $d])*
            $field_vis $field_name : $field_type,
            )*
        }

        impl ConfigField for $struct_name {
            fn set(&mut self, key: &str, value: &str) -> Result<()> {
                let (key, rem) = key.split_once('.').unwrap_or((key, ""));
                match key {
                    $(
                       stringify!($field_name) => self.$field_name.set(rem, value),
                    )*
                    _ => $crate::config_err!(
                        "Config value \"{}\" not found on {}", key, stringify!($struct_name)
                    )
                }
            }

            fn visit<V: Visit>(&self, v: &mut V, key_prefix: &str, _description: &'static str) {
                $(
                let key = format!(concat!("{}.", stringify!($field_name)), key_prefix);
                let desc = concat!($($d),*).trim();
                self.$field_name.visit(v, key.as_str(), desc);
                )*
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field_name: $default),*
                }
            }
        }
    }
}

config_namespace! {
    /// Options controlling how window functions are evaluated
    pub struct WindowOptions {
        /// Number of worker tasks partition groups are distributed over once
        /// the input has been shuffled. Defaults to the number of CPU cores
        /// on the system
        pub target_partitions: usize, default = num_cpus::get()

        /// When set to true, decomposable aggregates (sum, count, mean) and
        /// min/max are evaluated incrementally as the frame slides. When set
        /// to false, every frame is aggregated from scratch
        pub sliding_aggregates: bool, default = true

        /// Inputs with fewer rows than this are evaluated on the calling
        /// task without fanning partition groups out to workers
        pub min_rows_for_parallelism: usize, default = 8192

        /// Name of a column holding the global row id of each row. When
        /// unset, the row id is the position of the row in the input, counted
        /// across all batches
        pub row_id_column: Option<String>, default = None
    }
}

/// A key value pair, with a corresponding description
#[derive(Debug)]
pub struct ConfigEntry {
    /// A unique string to identify this config value
    pub key: String,

    /// The value if any
    pub value: Option<String>,

    /// A description of this configuration entry
    pub description: &'static str,
}

/// Configuration options struct
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct ConfigOptions {
    /// Window evaluation options
    pub window: WindowOptions,
}

impl ConfigField for ConfigOptions {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (key, rem) = key.split_once('.').unwrap_or((key, ""));
        match key {
            "window" => self.window.set(rem, value),
            _ => crate::config_err!("Config value \"{key}\" not found on ConfigOptions"),
        }
    }

    fn visit<V: Visit>(&self, v: &mut V, _key_prefix: &str, _description: &'static str) {
        self.window.visit(v, "shardwin.window", "");
    }
}

impl ConfigOptions {
    /// Creates a new [`ConfigOptions`] with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a configuration option
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let Some((prefix, key)) = key.split_once('.') else {
            return crate::config_err!(
                "could not find config namespace for key \"{key}\""
            );
        };

        if prefix == "shardwin" {
            return ConfigField::set(self, key, value);
        }

        crate::config_err!("Could not find config namespace \"{prefix}\"")
    }

    /// Sets the number of worker tasks used for group evaluation
    pub fn with_target_partitions(mut self, n: usize) -> Self {
        self.window.target_partitions = n;
        self
    }

    /// Chooses between incremental and recomputed frame aggregation
    pub fn with_sliding_aggregates(mut self, enabled: bool) -> Self {
        self.window.sliding_aggregates = enabled;
        self
    }

    /// Sets the input size below which evaluation stays on the calling task
    pub fn with_min_rows_for_parallelism(mut self, n: usize) -> Self {
        self.window.min_rows_for_parallelism = n;
        self
    }

    /// Reads global row ids from the named column
    pub fn with_row_id_column(mut self, name: impl Into<String>) -> Self {
        self.window.row_id_column = Some(name.into());
        self
    }

    /// Create new ConfigOptions struct, taking values from
    /// environment variables where possible.
    ///
    /// For example, setting `SHARDWIN_WINDOW_TARGET_PARTITIONS` will
    /// control `shardwin.window.target_partitions`.
    pub fn from_env() -> Result<Self> {
        let mut ret = Self::default();
        for key in Self::keys() {
            let env = key.to_uppercase().replace('.', "_");
            if let Some(var) = std::env::var_os(&env) {
                debug!("Setting {key} from {env}");
                ret.set(&key, var.to_string_lossy().as_ref())?;
            }
        }

        Ok(ret)
    }

    /// Create new ConfigOptions struct, taking values from a string hash map.
    ///
    /// Only the built-in configurations will be extracted from the hash map
    /// and other key value pairs will be ignored.
    pub fn from_string_hash_map(settings: &HashMap<String, String>) -> Result<Self> {
        let mut ret = Self::default();
        for key in Self::keys() {
            if let Some(var) = settings.get(&key) {
                ret.set(&key, var)?;
            }
        }

        Ok(ret)
    }

    /// Returns the [`ConfigEntry`] stored within this [`ConfigOptions`]
    pub fn entries(&self) -> Vec<ConfigEntry> {
        struct Visitor(Vec<ConfigEntry>);

        impl Visit for Visitor {
            fn some<V: Display>(
                &mut self,
                key: &str,
                value: V,
                description: &'static str,
            ) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    description,
                })
            }

            fn none(&mut self, key: &str, description: &'static str) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: None,
                    description,
                })
            }
        }

        let mut v = Visitor(vec![]);
        self.visit(&mut v, "shardwin", "");
        v.0
    }

    // Extract the names of all fields. Looking keys up this way avoids
    // ambiguity between `a.b` and `a_b` which would both correspond
    // to an environment variable of `A_B`
    fn keys() -> Vec<String> {
        struct Visitor(Vec<String>);

        impl Visit for Visitor {
            fn some<V: Display>(&mut self, key: &str, _: V, _: &'static str) {
                self.0.push(key.to_string())
            }

            fn none(&mut self, key: &str, _: &'static str) {
                self.0.push(key.to_string())
            }
        }

        let mut keys = Visitor(vec![]);
        Self::default().visit(&mut keys, "shardwin", "");
        keys.0
    }
}

/// A trait implemented by `config_namespace` and for field types that provides
/// the ability to walk and mutate the configuration tree
trait ConfigField {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str);

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

impl<F: ConfigField + Default> ConfigField for Option<F> {
    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        match self {
            Some(s) => s.visit(v, key, description),
            None => v.none(key, description),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.get_or_insert_with(Default::default).set(key, value)
    }
}

macro_rules! config_field {
    ($t:ty) => {
        impl ConfigField for $t {
            fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
                v.some(key, self, description)
            }

            fn set(&mut self, _: &str, value: &str) -> Result<()> {
                *self = value.parse().map_err(|e| {
                    ShardwinError::Configuration(format!(
                        concat!("Error parsing {} as ", stringify!($t), ": {}"),
                        value, e
                    ))
                })?;
                Ok(())
            }
        }
    };
}

config_field!(String);
config_field!(bool);
config_field!(usize);

/// An implementation trait used to recursively walk configuration
trait Visit {
    fn some<V: Display>(&mut self, key: &str, value: V, description: &'static str);

    fn none(&mut self, key: &str, description: &'static str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_read_back() -> Result<()> {
        let mut config = ConfigOptions::new();
        config.set("shardwin.window.target_partitions", "3")?;
        config.set("shardwin.window.sliding_aggregates", "false")?;
        config.set("shardwin.window.row_id_column", "rid")?;
        assert_eq!(config.window.target_partitions, 3);
        assert!(!config.window.sliding_aggregates);
        assert_eq!(config.window.row_id_column.as_deref(), Some("rid"));
        Ok(())
    }

    #[test]
    fn unknown_key_is_a_configuration_error() {
        let mut config = ConfigOptions::new();
        let err = config.set("shardwin.window.frobnicate", "1").unwrap_err();
        assert!(matches!(err, ShardwinError::Configuration(_)));
        let err = config.set("other.window.target_partitions", "1").unwrap_err();
        assert!(matches!(err, ShardwinError::Configuration(_)));
    }

    #[test]
    fn unparsable_value() {
        let mut config = ConfigOptions::new();
        let err = config
            .set("shardwin.window.min_rows_for_parallelism", "many")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid or Unsupported Configuration: Error parsing many as usize: invalid digit found in string"
        );
    }

    #[test]
    fn from_string_hash_map() -> Result<()> {
        let settings = HashMap::from([
            (
                "shardwin.window.min_rows_for_parallelism".to_string(),
                "0".to_string(),
            ),
            ("unrelated.key".to_string(), "ignored".to_string()),
        ]);
        let config = ConfigOptions::from_string_hash_map(&settings)?;
        assert_eq!(config.window.min_rows_for_parallelism, 0);
        assert!(config.window.sliding_aggregates);
        Ok(())
    }

    #[test]
    fn entries_list_every_option() {
        let config = ConfigOptions::new().with_row_id_column("rid");
        let entries = config.entries();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "shardwin.window.target_partitions",
                "shardwin.window.sliding_aggregates",
                "shardwin.window.min_rows_for_parallelism",
                "shardwin.window.row_id_column",
            ]
        );
        assert_eq!(entries[3].value.as_deref(), Some("rid"));
        assert!(!entries[1].description.is_empty());
    }
}
