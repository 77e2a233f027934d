//! Typed operations from the management working draft

mod entity;

pub use entity::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    UpdateRequest, UpdateResponse,
};

use siderite_amqp_types::messaging::Message;
use siderite_amqp_types::primitives::OrderedMap;
use siderite_amqp_types::Value;

use crate::error::Error;

/// Extracts the map body used by most management responses, keyed by
/// string or symbol
pub(crate) fn map_body(message: Message) -> Result<OrderedMap<String, Value>, Error> {
    let value = message.body.try_into_value()?;
    let map: OrderedMap<Value, Value> = match value {
        Value::Map(map) => map,
        // an empty body decodes as null
        Value::Null => return Ok(OrderedMap::new()),
        _ => {
            return Err(Error::InvalidType {
                expecting: "a map body",
            })
        }
    };

    let mut attributes = OrderedMap::new();
    for (key, val) in map.into_iter() {
        let key = match key {
            Value::String(key) => key,
            Value::Symbol(key) => key.into_inner(),
            _ => {
                return Err(Error::InvalidType {
                    expecting: "string keys in the map body",
                })
            }
        };
        attributes.insert(key, val);
    }
    Ok(attributes)
}
