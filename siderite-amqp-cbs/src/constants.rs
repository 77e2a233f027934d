//! Well-known names of the claims-based-security protocol

/// The reserved node address of the claims-based-security endpoint
pub const CBS_NODE_ADDRESS: &str = "$cbs";

/// The default client node address used as the reply-to of requests
pub const DEFAULT_CBS_CLIENT_NODE: &str = "siderite-cbs-client-node";

/// The operation name of the token put request
pub const PUT_TOKEN: &str = "put-token";

/// Application-property key carrying the audience of the token
pub const NAME: &str = "name";

/// Application-property key carrying the token expiration
pub const EXPIRATION: &str = "expiration";

/// The token type of a service bus shared-access-signature token
pub const SAS_TOKEN_TYPE: &str = "servicebus.windows.net:sastoken";

/// The token type of a JSON web token
pub const JWT_TOKEN_TYPE: &str = "jwt";
