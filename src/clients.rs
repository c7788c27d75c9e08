pub(crate) mod core_service;
pub(crate) mod guardian;
pub(crate) mod headers;

pub(crate) use core_service::CoreServiceClient;
pub(crate) use guardian::GuardianClient;
