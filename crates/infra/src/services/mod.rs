mod delivery;
mod upstream;

pub use delivery::{
    DeliveryError, DeliveryReceipt, IDeliveryChannel, InMemoryDeliveryChannel,
    NotificationMessage, ScriptedDelivery, WebhookDeliveryChannel,
};
pub use upstream::{
    AuthError, FetchError, ICredentialSource, IUpstreamProvider, InMemoryUpstreamProvider,
    PerfectGymProvider, StaticCredentialSource, UpstreamCredentials, UpstreamSession,
};
