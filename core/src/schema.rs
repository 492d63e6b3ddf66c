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

//! Read-only view of an array schema, as needed to size column buffers.

use crate::data_type::{CellValNum, DataType};
use std::collections::HashMap;

/// String key/value configuration attached to the context a schema was opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub cell_val_num: CellValNum,
    pub nullable: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            cell_val_num: CellValNum::single(),
            nullable: false,
        }
    }

    pub fn with_cell_val_num(mut self, cell_val_num: CellValNum) -> Self {
        self.cell_val_num = cell_val_num;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub data_type: DataType,
    pub cell_val_num: CellValNum,
}

impl Dimension {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        // string dimensions are always variable-length
        let cell_val_num = if data_type.is_string() {
            CellValNum::Var
        } else {
            CellValNum::single()
        };
        Self {
            name: name.into(),
            data_type,
            cell_val_num,
        }
    }

    pub fn with_cell_val_num(mut self, cell_val_num: CellValNum) -> Self {
        self.cell_val_num = cell_val_num;
        self
    }
}

/// The lookups a column buffer needs from an array schema.
pub trait ArraySchema {
    /// Returns the attribute called `name`, if any.
    fn attribute(&self, name: &str) -> Option<&Attribute>;

    /// Returns the dimension called `name`, if any.
    fn dimension(&self, name: &str) -> Option<&Dimension>;

    /// Returns the configuration of the context the schema belongs to.
    fn config(&self) -> &Config;
}

/// A plain in-memory schema: dimensions and attributes in declaration order, plus the context
/// configuration.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    config: Config,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Names of all dimensions followed by all attributes.
    pub fn column_names(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|d| d.name.clone())
            .chain(self.attributes.iter().map(|a| a.name.clone()))
            .collect()
    }
}

impl ArraySchema for Schema {
    fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    fn config(&self) -> &Config {
        &self.config
    }
}
