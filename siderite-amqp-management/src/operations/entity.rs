//! CRUD operations on manageable entities

use siderite_amqp_types::messaging::{AmqpValue, Body, Message};
use siderite_amqp_types::primitives::OrderedMap;
use siderite_amqp_types::Value;

use crate::constants::{CREATE, DELETE, READ, UPDATE};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

use super::map_body;

fn attributes_to_body(attributes: OrderedMap<String, Value>) -> Body {
    let map: OrderedMap<Value, Value> = attributes
        .into_iter()
        .map(|(key, val)| (Value::String(key), val))
        .collect();
    Body::Value(AmqpValue(Value::Map(map)))
}

/// Creates a new manageable entity
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// The type of entity to create
    pub entity_type: String,

    /// The initial attribute values
    pub attributes: OrderedMap<String, Value>,

    /// The locales of the request
    pub locales: Option<String>,
}

impl Request for CreateRequest {
    const OPERATION: &'static str = CREATE;
    type Response = CreateResponse;

    fn manageable_entity_type(&mut self) -> Option<String> {
        Some(self.entity_type.clone())
    }

    fn locales(&mut self) -> Option<String> {
        self.locales.clone()
    }

    fn encode_body(self) -> Body {
        attributes_to_body(self.attributes)
    }
}

/// The attributes of the created entity
#[derive(Debug, Clone)]
pub struct CreateResponse {
    /// The actual attribute values of the entity
    pub attributes: OrderedMap<String, Value>,
}

impl Response for CreateResponse {
    const STATUS_CODE: u16 = 201;

    fn decode_message(message: Message) -> Result<Self, Error> {
        Ok(Self {
            attributes: map_body(message)?,
        })
    }
}

/// Reads the attributes of a manageable entity
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// The type of entity to read
    pub entity_type: String,

    /// The locales of the request
    pub locales: Option<String>,
}

impl ReadRequest {
    /// Creates a read request for the given entity type
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            locales: None,
        }
    }
}

impl Request for ReadRequest {
    const OPERATION: &'static str = READ;
    type Response = ReadResponse;

    fn manageable_entity_type(&mut self) -> Option<String> {
        Some(self.entity_type.clone())
    }

    fn locales(&mut self) -> Option<String> {
        self.locales.clone()
    }

    fn encode_body(self) -> Body {
        Body::Nothing
    }
}

/// The attributes of the read entity
#[derive(Debug, Clone)]
pub struct ReadResponse {
    /// The attribute values of the entity
    pub attributes: OrderedMap<String, Value>,
}

impl Response for ReadResponse {
    const STATUS_CODE: u16 = 200;

    fn decode_message(message: Message) -> Result<Self, Error> {
        Ok(Self {
            attributes: map_body(message)?,
        })
    }
}

/// Updates a manageable entity
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// The type of entity to update
    pub entity_type: String,

    /// The attribute values to change
    pub attributes: OrderedMap<String, Value>,

    /// The locales of the request
    pub locales: Option<String>,
}

impl Request for UpdateRequest {
    const OPERATION: &'static str = UPDATE;
    type Response = UpdateResponse;

    fn manageable_entity_type(&mut self) -> Option<String> {
        Some(self.entity_type.clone())
    }

    fn locales(&mut self) -> Option<String> {
        self.locales.clone()
    }

    fn encode_body(self) -> Body {
        attributes_to_body(self.attributes)
    }
}

/// The attributes of the updated entity
#[derive(Debug, Clone)]
pub struct UpdateResponse {
    /// The attribute values after the update
    pub attributes: OrderedMap<String, Value>,
}

impl Response for UpdateResponse {
    const STATUS_CODE: u16 = 200;

    fn decode_message(message: Message) -> Result<Self, Error> {
        Ok(Self {
            attributes: map_body(message)?,
        })
    }
}

/// Deletes a manageable entity
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// The type of entity to delete
    pub entity_type: String,

    /// The locales of the request
    pub locales: Option<String>,
}

impl DeleteRequest {
    /// Creates a delete request for the given entity type
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            locales: None,
        }
    }
}

impl Request for DeleteRequest {
    const OPERATION: &'static str = DELETE;
    type Response = DeleteResponse;

    fn manageable_entity_type(&mut self) -> Option<String> {
        Some(self.entity_type.clone())
    }

    fn locales(&mut self) -> Option<String> {
        self.locales.clone()
    }

    fn encode_body(self) -> Body {
        Body::Nothing
    }
}

/// Acknowledges the deletion
#[derive(Debug, Clone)]
pub struct DeleteResponse {}

impl Response for DeleteResponse {
    const STATUS_CODE: u16 = 204;

    fn decode_message(_message: Message) -> Result<Self, Error> {
        Ok(Self {})
    }
}
