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

mod common;

use arrow::{
    array::{Array, AsArray},
    datatypes::{Float32Type, Int64Type},
};
use common::MemoryArray;
use soma_buffers::{
    config::CONFIG_KEY_INIT_BYTES,
    data_type::{CellValNum, DataType},
    query::Query,
    reader::ManagedQuery,
    schema::{Attribute, Dimension, Schema},
    ArrayBuffers, ColumnBuffer, SomaError,
};

const NUM_ROWS: usize = 25;

fn schema(init_bytes: &str) -> Schema {
    Schema::new()
        .with_dimension(Dimension::new("soma_joinid", DataType::Int64))
        .with_attribute(
            Attribute::new("obs_id", DataType::StringUtf8)
                .with_cell_val_num(CellValNum::Var)
                .with_nullable(true),
        )
        .with_attribute(Attribute::new("value", DataType::Float32))
        .with_config([(CONFIG_KEY_INIT_BYTES, init_bytes)].into_iter().collect())
}

fn obs_id(i: usize) -> String {
    format!("cell_{i}")
}

/// Writes `NUM_ROWS` rows through the write path; every third `obs_id` is null.
fn populated(init_bytes: &str) -> MemoryArray {
    let schema = schema(init_bytes);
    let joinids: Vec<i64> = (0..NUM_ROWS as i64).collect();
    let ids: Vec<String> = (0..NUM_ROWS).map(obs_id).collect();
    let validity: Vec<u8> = (0..NUM_ROWS).map(|i| (i % 3 != 0) as u8).collect();
    let values: Vec<f32> = (0..NUM_ROWS).map(|i| i as f32 * 0.5).collect();

    let mut buffers = ArrayBuffers::new();
    buffers.emplace(ColumnBuffer::from_values(&schema, "soma_joinid", &joinids, None).unwrap());
    buffers.emplace(ColumnBuffer::from_strings(&schema, "obs_id", &ids, Some(&validity)).unwrap());
    buffers.emplace(ColumnBuffer::from_values(&schema, "value", &values, None).unwrap());

    let mut array = MemoryArray::new(schema);
    let result = {
        let mut query = array.write_query();
        buffers.attach(&mut query).unwrap();
        query.submit().unwrap()
    };
    assert_eq!(buffers.update_sizes(&result.sizes).unwrap(), NUM_ROWS);
    assert_eq!(array.num_cells(), NUM_ROWS);
    array
}

#[test]
fn test_read_in_batches() {
    let _ = soma_buffers::init_logging(None);

    // 64 bytes hold 8 joinids, 8 obs_ids of up to 8 bytes each, 16 values
    let array = populated("64");
    let schema = array.schema().clone();
    let mut reader =
        ManagedQuery::new(array, &schema, &["soma_joinid", "obs_id", "value"]).unwrap();

    let capacity = reader.results().at("obs_id").unwrap().cell_capacity();
    let data_ptr = reader.results().at("value").unwrap().data::<f32>().as_ptr();
    assert_eq!(capacity, 8);

    let mut batch_sizes = vec![];
    let mut joinids = vec![];
    let mut ids = vec![];
    let mut values = vec![];
    while let Some(batch) = reader.read_next().unwrap() {
        batch_sizes.push(batch.num_rows());
        joinids.extend_from_slice(batch.at("soma_joinid").unwrap().data::<i64>());
        values.extend_from_slice(batch.at("value").unwrap().data::<f32>());

        let column = batch.at("obs_id").unwrap();
        let validity = column.validity().unwrap();
        for i in 0..column.num_cells() {
            let id = column.string_view(i).unwrap();
            ids.push((validity[i] != 0).then(|| id.to_string()));
        }

        // buffers are reused, never reallocated
        assert_eq!(column.cell_capacity(), capacity);
        assert_eq!(
            batch.at("value").unwrap().data::<f32>().as_ptr(),
            data_ptr
        );
    }

    assert!(reader.is_complete());
    assert_eq!(batch_sizes, vec![8, 8, 8, 1]);
    assert_eq!(reader.total_num_cells(), NUM_ROWS);
    assert_eq!(joinids, (0..NUM_ROWS as i64).collect::<Vec<_>>());
    assert_eq!(values[9], 4.5);
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id.is_some(), i % 3 != 0, "row {i}");
        if let Some(id) = id {
            assert_eq!(id, &obs_id(i));
        }
    }

    // exhausted readers keep returning nothing
    assert!(reader.read_next().unwrap().is_none());
}

#[test]
fn test_single_batch_to_record_batch() {
    let array = populated("4096");
    let schema = array.schema().clone();
    let mut reader = ManagedQuery::new(array, &schema, &["obs_id", "value"]).unwrap();

    let batch = reader.read_next().unwrap().unwrap();
    assert_eq!(batch.num_rows(), NUM_ROWS);
    let record_batch = batch.to_record_batch().unwrap();
    assert_eq!(record_batch.num_rows(), NUM_ROWS);
    assert_eq!(record_batch.schema().field(0).name(), "obs_id");
    assert!(record_batch.schema().field(0).is_nullable());
    assert!(!record_batch.schema().field(1).is_nullable());

    let ids = record_batch.column(0).as_string::<i64>();
    assert_eq!(ids.null_count(), NUM_ROWS.div_ceil(3));
    assert!(ids.is_null(0));
    assert_eq!(ids.value(4), "cell_4");
    let values = record_batch.column(1).as_primitive::<Float32Type>();
    assert_eq!(values.value(24), 12.0);

    assert!(reader.read_next().unwrap().is_none());
    assert!(reader.is_complete());
}

#[test]
fn test_read_only_dimension() {
    let array = populated("16");
    let schema = array.schema().clone();
    let mut reader = ManagedQuery::new(array, &schema, &["soma_joinid"]).unwrap();

    let mut total = 0;
    let mut batches = 0;
    while let Some(batch) = reader.read_next().unwrap() {
        let record_batch = batch.to_record_batch().unwrap();
        let joinids = record_batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(joinids.value(0), total as i64);
        total += record_batch.num_rows();
        batches += 1;
    }
    assert_eq!(total, NUM_ROWS);
    assert_eq!(batches, NUM_ROWS.div_ceil(2));
}

#[test]
fn test_empty_array() {
    let schema = schema("64");
    let array = MemoryArray::new(schema.clone());
    let mut reader = ManagedQuery::new(array, &schema, &["soma_joinid", "obs_id"]).unwrap();

    let batch = reader.read_next().unwrap().unwrap();
    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.to_record_batch().unwrap().num_rows(), 0);
    assert!(reader.read_next().unwrap().is_none());
    assert_eq!(reader.total_num_cells(), 0);
}

#[test]
fn test_one_cell_per_batch() {
    // one offsets slot and 8 data bytes, enough for "cell_24"
    let schema = schema("8");
    let array = populated("8");
    let mut reader = ManagedQuery::new(array, &schema, &["obs_id"]).unwrap();
    assert_eq!(reader.results().at("obs_id").unwrap().cell_capacity(), 1);

    let mut batches = 0;
    while let Some(batch) = reader.read_next().unwrap() {
        assert_eq!(batch.num_rows(), 1);
        batches += 1;
    }
    assert_eq!(batches, NUM_ROWS);
}

#[test]
fn test_buffers_too_small() {
    // 4 bytes leave no room for a single offset
    let schema = schema("4");
    let array = populated("4096");
    let mut reader = ManagedQuery::new(array, &schema, &["obs_id"]).unwrap();
    assert_eq!(reader.results().at("obs_id").unwrap().cell_capacity(), 0);
    assert!(matches!(reader.read_next(), Err(SomaError::Internal(_))));
}
