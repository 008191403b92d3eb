pub mod aliyun;
pub mod openai;
pub mod self_hosted;

use std::sync::Arc;

use crate::ai::core::ModelClient;
use crate::database::models::{ModelProvider, ProviderKind};
use crate::error::CoreResult;

pub use aliyun::AliyunClient;
pub use openai::OpenAiClient;
pub use self_hosted::SelfHostedClient;

/// Build the concrete client for a provider row.
pub fn create_client(provider: &ModelProvider) -> CoreResult<Arc<dyn ModelClient>> {
    match provider.provider_type {
        ProviderKind::OpenAi => Ok(Arc::new(OpenAiClient::new(provider)?)),
        ProviderKind::SelfHosted => Ok(Arc::new(SelfHostedClient::new(provider)?)),
        ProviderKind::Aliyun => Ok(Arc::new(AliyunClient::new(provider)?)),
    }
}
