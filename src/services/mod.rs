pub mod s3_store;
pub mod storage_gateway;
pub mod upload_service;
