pub mod client;

pub use client::{
    GatewayMetadata, GatewayPaymentAttributes, GatewayPaymentRecord, HttpGatewayClient,
    PaymentGatewayClient,
};
