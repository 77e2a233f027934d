//! Well-known keys and addresses of the management protocol

/// The default management node address
pub const MANAGEMENT_NODE_ADDRESS: &str = "$management";

/// The default client node address used as the reply-to of requests
pub const DEFAULT_CLIENT_NODE_ADDRESS: &str = "siderite-mgmt-client-node";

/// Application-property key naming the operation
pub const OPERATION: &str = "operation";

/// Application-property key naming the manageable entity type
pub const TYPE: &str = "type";

/// Application-property key carrying the locales of the request
pub const LOCALES: &str = "locales";

/// Default application-property key of the response status code
pub const STATUS_CODE: &str = "statusCode";

/// Default application-property key of the response status description
pub const STATUS_DESCRIPTION: &str = "statusDescription";

/// Operation name of the create operation
pub const CREATE: &str = "CREATE";

/// Operation name of the read operation
pub const READ: &str = "READ";

/// Operation name of the update operation
pub const UPDATE: &str = "UPDATE";

/// Operation name of the delete operation
pub const DELETE: &str = "DELETE";
