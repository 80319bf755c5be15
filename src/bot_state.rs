use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::database::Database;
use crate::models::DraftBooking;
use crate::payments::yookassa::YookassaClient;
use crate::payments::ReconciliationSupervisor;

type DraftMap = Arc<RwLock<HashMap<ChatId, DraftBooking>>>;

/// Общее состояние бота. Черновики живут в памяти по одному на чат:
/// диалог одного пользователя строго последовательный, в базу
/// попадает только готовая бронь.
#[derive(Clone)]
pub struct BotState {
    pub db: Database,
    pub gateway: Arc<YookassaClient>,
    pub reconciler: ReconciliationSupervisor,
    drafts: DraftMap,
}

impl BotState {
    pub fn new(db: Database, gateway: YookassaClient) -> Self {
        Self {
            db,
            gateway: Arc::new(gateway),
            reconciler: ReconciliationSupervisor::new(),
            drafts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn draft(&self, chat_id: ChatId) -> Option<DraftBooking> {
        self.drafts.read().await.get(&chat_id).cloned()
    }

    pub async fn set_draft(&self, chat_id: ChatId, draft: DraftBooking) {
        self.drafts.write().await.insert(chat_id, draft);
    }

    pub async fn clear_draft(&self, chat_id: ChatId) {
        self.drafts.write().await.remove(&chat_id);
    }
}
