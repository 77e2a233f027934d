//! The management client: a paired sender and receiver with a response
//! correlator

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use siderite_amqp::link::{Receiver, Sender};
use siderite_amqp::session::SessionHandle;
use siderite_amqp_types::definitions::Fields;
use siderite_amqp_types::messaging::{Message, MessageId, Properties};
use siderite_amqp_types::primitives::SimpleValue;

use crate::constants::{
    DEFAULT_CLIENT_NODE_ADDRESS, MANAGEMENT_NODE_ADDRESS, STATUS_CODE, STATUS_DESCRIPTION,
};
use crate::error::{AttachError, Error};
use crate::request::Request;
use crate::response::Response;
use crate::status::StatusCode;

type Pending = Arc<Mutex<HashMap<MessageId, oneshot::Sender<Message>>>>;

/// A client for the AMQP management protocol.
///
/// The client owns a sender to the management node and a receiver from it.
/// The receiver is driven by a background task that matches each response's
/// correlation-id against the message-id of an outstanding request, so any
/// number of requests may be in flight concurrently.
#[derive(Debug)]
pub struct ManagementClient {
    sender: Sender,
    client_node_addr: String,
    status_code_key: String,
    status_description_key: String,
    pending: Pending,
    pump: Option<JoinHandle<Receiver>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ManagementClient {
    /// Creates a builder for a management client
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Attaches a management client to a session with the default
    /// configuration
    pub async fn attach(session: &mut SessionHandle) -> Result<Self, AttachError> {
        Self::builder().attach(session).await
    }

    /// Sends a request and returns a handle resolving to its correlated
    /// response.
    ///
    /// Responses are matched by correlation-id, so several requests may be
    /// outstanding at once; each handle only ever observes its own
    /// response.
    pub async fn send_request<Req>(
        &mut self,
        request: Req,
    ) -> Result<OutstandingRequest<Req::Response>, Error>
    where
        Req: Request,
    {
        let mut message = request.into_message();

        // a fresh UUID correlates the response with this request
        let message_id = MessageId::Uuid(uuid::Uuid::new_v4().into());
        let properties = message.properties.get_or_insert_with(Properties::default);
        properties.message_id = Some(message_id.clone());
        properties
            .reply_to
            .get_or_insert_with(|| self.client_node_addr.clone());

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(message_id.clone(), tx);

        let outcome = match self.sender.send(message).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.pending.lock().remove(&message_id);
                return Err(err.into());
            }
        };
        if !outcome.is_accepted() {
            self.pending.lock().remove(&message_id);
            return Err(Error::NotAccepted(outcome));
        }

        Ok(OutstandingRequest {
            rx,
            status_code_key: self.status_code_key.clone(),
            status_description_key: self.status_description_key.clone(),
            response: PhantomData,
        })
    }

    /// Sends a request and waits for its response
    pub async fn call<Req>(&mut self, request: Req) -> Result<Req::Response, Error>
    where
        Req: Request,
    {
        self.send_request(request).await?.recv_response().await
    }

    /// Closes both links.
    ///
    /// Outstanding operations complete with
    /// [`Error::InstanceClosed`](crate::error::Error::InstanceClosed).
    pub async fn close(self) -> Result<(), Error> {
        let ManagementClient {
            sender,
            pending,
            pump,
            shutdown,
            ..
        } = self;

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        // dropping the pending senders wakes every outstanding request
        pending.lock().clear();

        sender.close().await?;
        if let Some(pump) = pump {
            if let Ok(receiver) = pump.await {
                receiver.close().await?;
            }
        }
        Ok(())
    }
}

/// A request that has been sent and is waiting for its correlated response
#[derive(Debug)]
pub struct OutstandingRequest<Res> {
    rx: oneshot::Receiver<Message>,
    status_code_key: String,
    status_description_key: String,
    response: PhantomData<fn() -> Res>,
}

impl<Res> OutstandingRequest<Res>
where
    Res: Response,
{
    /// Waits for the correlated response, verifies its status and decodes
    /// it
    pub async fn recv_response(self) -> Result<Res, Error> {
        let mut message = self.rx.await.map_err(|_| Error::InstanceClosed)?;

        let status_code = take_status_code(&mut message, &self.status_code_key)
            .ok_or(Error::StatusCodeNotFound)??;
        if !status_code.is_success() {
            let description = take_status_description(&mut message, &self.status_description_key);
            return Err(Error::Status {
                code: status_code,
                description,
            });
        }

        Res::decode_message(message)
    }
}

fn take_status_code(
    message: &mut Message,
    key: &str,
) -> Option<Result<StatusCode, Error>> {
    let properties = message.application_properties.as_mut()?;
    let value = properties.remove(key)?;
    Some(StatusCode::try_from(&value).map_err(|_| Error::InvalidType {
        expecting: "an integer status code",
    }))
}

fn take_status_description(message: &mut Message, key: &str) -> Option<String> {
    let properties = message.application_properties.as_mut()?;
    match properties.remove(key)? {
        SimpleValue::String(description) => Some(description),
        SimpleValue::Symbol(description) => Some(description.into_inner()),
        _ => None,
    }
}

fn spawn_response_pump(
    mut receiver: Receiver,
    pending: Pending,
    mut shutdown: oneshot::Receiver<()>,
) -> JoinHandle<Receiver> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                result = receiver.recv() => {
                    let delivery = match result {
                        Ok(delivery) => delivery,
                        // link detached or session ended
                        Err(_) => break,
                    };
                    let message = delivery.into_message();
                    let correlation_id = message
                        .properties
                        .as_ref()
                        .and_then(|properties| properties.correlation_id.clone());
                    match correlation_id {
                        Some(id) => {
                            // take the entry out of the map before
                            // resolving so a re-entrant caller never sees
                            // the map locked
                            let tx = pending.lock().remove(&id);
                            match tx {
                                Some(tx) => {
                                    let _ = tx.send(message);
                                }
                                None => trace!(?id, "No outstanding request for response"),
                            }
                        }
                        None => warn!("Response carries no correlation-id"),
                    }
                }
            }
        }
        receiver
    })
}

/// Builder for a [`ManagementClient`]
#[derive(Debug, Clone)]
pub struct Builder {
    /// The address of the management node
    pub management_node_address: String,

    /// The local node address used as the reply-to of requests
    pub client_node_address: String,

    /// The application-property key of the response status code
    pub status_code_key: String,

    /// The application-property key of the response status description
    pub status_description_key: String,

    /// Properties of the request sender link
    pub sender_properties: Option<Fields>,

    /// Properties of the response receiver link
    pub receiver_properties: Option<Fields>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            management_node_address: MANAGEMENT_NODE_ADDRESS.to_string(),
            client_node_address: DEFAULT_CLIENT_NODE_ADDRESS.to_string(),
            status_code_key: STATUS_CODE.to_string(),
            status_description_key: STATUS_DESCRIPTION.to_string(),
            sender_properties: None,
            receiver_properties: None,
        }
    }
}

impl Builder {
    /// Sets the management node address
    pub fn management_node_address(mut self, addr: impl Into<String>) -> Self {
        self.management_node_address = addr.into();
        self
    }

    /// Sets the client node address
    pub fn client_node_address(mut self, addr: impl Into<String>) -> Self {
        self.client_node_address = addr.into();
        self
    }

    /// Overrides the application-property key of the status code
    pub fn status_code_key(mut self, key: impl Into<String>) -> Self {
        self.status_code_key = key.into();
        self
    }

    /// Overrides the application-property key of the status description
    pub fn status_description_key(mut self, key: impl Into<String>) -> Self {
        self.status_description_key = key.into();
        self
    }

    /// Sets the sender link properties
    pub fn sender_properties(mut self, properties: Fields) -> Self {
        self.sender_properties = Some(properties);
        self
    }

    /// Sets the receiver link properties
    pub fn receiver_properties(mut self, properties: Fields) -> Self {
        self.receiver_properties = Some(properties);
        self
    }

    /// Attaches the paired sender and receiver to the session and spawns
    /// the response pump
    pub async fn attach(self, session: &mut SessionHandle) -> Result<ManagementClient, AttachError> {
        let mut sender_builder = Sender::builder()
            .name(format!("{}-mgmt-sender", self.client_node_address))
            .target(self.management_node_address.as_str());
        if let Some(properties) = self.sender_properties {
            sender_builder = sender_builder.properties(properties);
        }
        let sender = sender_builder
            .attach(session)
            .await
            .map_err(AttachError::Sender)?;

        let mut receiver_builder = Receiver::builder()
            .name(format!("{}-mgmt-receiver", self.client_node_address))
            .source(self.management_node_address.as_str())
            .target(self.client_node_address.as_str());
        if let Some(properties) = self.receiver_properties {
            receiver_builder = receiver_builder.properties(properties);
        }
        let receiver = receiver_builder
            .attach(session)
            .await
            .map_err(AttachError::Receiver)?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let pump = spawn_response_pump(receiver, pending.clone(), shutdown_rx);

        Ok(ManagementClient {
            sender,
            client_node_addr: self.client_node_address,
            status_code_key: self.status_code_key,
            status_description_key: self.status_description_key,
            pending,
            pump: Some(pump),
            shutdown: Some(shutdown_tx),
        })
    }
}
