//! 测试用内存实现

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mail_dispatch::account::domain::entities::{Account, AccountId};
use mail_dispatch::account::domain::repositories::{AccountFilter, AccountRepository};
use mail_dispatch::account::domain::services::CredentialVault;
use mail_dispatch::dispatch::application::{
    BatchedSendEngine, DeliveryReconciler, DispatchOutbox, MailDispatchService, TaskDispatcher,
};
use mail_dispatch::dispatch::domain::entities::{
    DeliveryBatch, DeliveryId, DeliveryRecord, MailId, MailRecord, SendMailJob,
};
use mail_dispatch::dispatch::domain::repositories::{
    DeliveryFilter, DeliveryRepository, MailFilter, MailOutboxStore, MailRepository,
};
use mail_dispatch::template::application::TemplateRenderer;
use mail_dispatch::template::domain::entities::{MailTemplate, TemplateId};
use mail_dispatch::template::domain::repositories::{TemplateFilter, TemplateRepository};
use mailroom_adapter_email::{MailConnection, MailTransport, OutgoingMail};
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::{AppError, AppResult};
use mailroom_ports::{ObjectStorage, TaskQueue};
use secrecy::{ExposeSecret, Secret};

pub const PROVIDER: &str = "QuantumMailServer";
pub const STREAM: &str = "mail:jobs";
pub const SENDER: &str = "ops@example.com";
pub const PASSWORD: &str = "s3cret-pass";

fn page<T: Clone>(items: Vec<T>, pagination: &Pagination) -> PagedResult<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.page_size as usize)
        .collect();
    PagedResult::new(items, total, pagination)
}

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    templates: HashMap<TemplateId, MailTemplate>,
    mails: HashMap<MailId, MailRecord>,
    deliveries: HashMap<DeliveryId, DeliveryRecord>,
    batches: BTreeMap<(DeliveryId, i32), DeliveryBatch>,
}

/// 内存仓储，实现全部仓储接口
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    /// 发件箱写入失败
    pub fail_outbox: AtomicBool,
    /// 接下来若干次投递记录更新返回 Conflict
    pub pending_conflicts: AtomicUsize,
    pub delivery_updates: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mail_count(&self) -> usize {
        self.state.lock().unwrap().mails.len()
    }

    pub fn delivery_count(&self) -> usize {
        self.state.lock().unwrap().deliveries.len()
    }

    pub fn mail(&self, id: &MailId) -> Option<MailRecord> {
        self.state.lock().unwrap().mails.get(id).cloned()
    }

    pub fn delivery(&self, id: &DeliveryId) -> Option<DeliveryRecord> {
        self.state.lock().unwrap().deliveries.get(id).cloned()
    }

    pub fn only_delivery(&self) -> DeliveryRecord {
        let state = self.state.lock().unwrap();
        assert_eq!(state.deliveries.len(), 1);
        state.deliveries.values().next().cloned().unwrap()
    }

    pub fn batches(&self, delivery_id: &DeliveryId) -> Vec<DeliveryBatch> {
        let state = self.state.lock().unwrap();
        state
            .batches
            .values()
            .filter(|b| &b.delivery_id == delivery_id)
            .cloned()
            .collect()
    }

    pub fn template(&self, id: &TemplateId) -> Option<MailTemplate> {
        self.state.lock().unwrap().templates.get(id).cloned()
    }

    /// 直接写入记录，模拟已落库的发送请求
    pub fn insert_outbox(&self, mail: &MailRecord, delivery: &DeliveryRecord) {
        let mut state = self.state.lock().unwrap();
        state.mails.insert(mail.id, mail.clone());
        state.deliveries.insert(delivery.id, delivery.clone());
    }

    pub fn remove_delivery(&self, id: &DeliveryId) {
        let mut state = self.state.lock().unwrap();
        state.deliveries.remove(id);
        state.batches.retain(|(delivery_id, _), _| delivery_id != id);
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn create(&self, account: &Account) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let taken = state
            .accounts
            .values()
            .any(|a| a.is_active() && a.owns_address(&account.address));
        if taken {
            return Err(AppError::conflict("Failed to create account: already exists"));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> AppResult<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.get(id).filter(|a| a.is_active()).cloned())
    }

    async fn find(&self, filter: &AccountFilter) -> AppResult<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .values()
            .filter(|a| a.is_active())
            .filter(|a| filter.owner_id.is_none_or(|owner| a.owner_id == owner))
            .filter(|a| filter.address.as_deref().is_none_or(|addr| a.owns_address(addr)))
            .find(|a| filter.is_default.is_none_or(|d| a.is_default == d))
            .cloned())
    }

    async fn update_by_id(&self, account: &Account) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get_mut(&account.id).filter(|a| a.is_active()) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Account not found")),
        }
    }

    async fn delete_by_id(&self, id: &AccountId, deleted_by: UserId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get_mut(id).filter(|a| a.is_active()) {
            Some(account) => {
                account.deletion.mark(deleted_by);
                Ok(())
            }
            None => Err(AppError::not_found("Account not found")),
        }
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<Account>> {
        let state = self.state.lock().unwrap();
        let items = state
            .accounts
            .values()
            .filter(|a| a.is_active() && &a.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }
}

#[async_trait]
impl TemplateRepository for InMemoryStore {
    async fn create(&self, template: &MailTemplate) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let taken = state.templates.values().any(|t| {
            !t.deletion.is_deleted && t.owner_id == template.owner_id && t.name == template.name
        });
        if taken {
            return Err(AppError::conflict("Failed to create template: already exists"));
        }
        state.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TemplateId) -> AppResult<Option<MailTemplate>> {
        let state = self.state.lock().unwrap();
        Ok(state.templates.get(id).filter(|t| !t.deletion.is_deleted).cloned())
    }

    async fn find(&self, filter: &TemplateFilter) -> AppResult<Option<MailTemplate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .templates
            .values()
            .filter(|t| !t.deletion.is_deleted && t.owner_id == filter.owner_id)
            .filter(|t| filter.id.is_none_or(|id| t.id == id))
            .find(|t| filter.name.as_deref().is_none_or(|name| t.name == name))
            .cloned())
    }

    async fn update_by_id(&self, template: &MailTemplate) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.templates.get_mut(&template.id).filter(|t| !t.deletion.is_deleted) {
            Some(existing) => {
                *existing = template.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Template not found")),
        }
    }

    async fn set_cache_id(&self, id: &TemplateId, storage_reference: &str, cache_id: &str) -> AppResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.templates.get_mut(id).filter(|t| {
            !t.deletion.is_deleted && t.storage_reference.as_deref() == Some(storage_reference)
        }) {
            Some(template) => {
                template.cache_id = Some(cache_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: &TemplateId, deleted_by: UserId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.templates.get_mut(id).filter(|t| !t.deletion.is_deleted) {
            Some(template) => {
                template.deletion.mark(deleted_by);
                Ok(())
            }
            None => Err(AppError::not_found("Template not found")),
        }
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<MailTemplate>> {
        let state = self.state.lock().unwrap();
        let items = state
            .templates
            .values()
            .filter(|t| !t.deletion.is_deleted && &t.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }
}

#[async_trait]
impl MailRepository for InMemoryStore {
    async fn find_by_id(&self, id: &MailId) -> AppResult<Option<MailRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.mails.get(id).filter(|m| !m.deletion.is_deleted).cloned())
    }

    async fn delete_by_id(&self, id: &MailId, deleted_by: UserId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.mails.get_mut(id).filter(|m| !m.deletion.is_deleted) {
            Some(mail) => {
                mail.deletion.mark(deleted_by);
                Ok(())
            }
            None => Err(AppError::not_found("Mail not found")),
        }
    }

    async fn index(&self, filter: &MailFilter, pagination: &Pagination) -> AppResult<PagedResult<MailRecord>> {
        let state = self.state.lock().unwrap();
        let items = state
            .mails
            .values()
            .filter(|m| !m.deletion.is_deleted && m.owner_id == filter.owner_id)
            .filter(|m| filter.kind.is_none_or(|kind| m.kind == kind))
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }
}

#[async_trait]
impl DeliveryRepository for InMemoryStore {
    async fn find_by_id(&self, id: &DeliveryId) -> AppResult<Option<DeliveryRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state.deliveries.get(id).filter(|d| !d.deletion.is_deleted).cloned())
    }

    async fn find(&self, filter: &DeliveryFilter) -> AppResult<Option<DeliveryRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deliveries
            .values()
            .find(|d| !d.deletion.is_deleted && d.mail == filter.mail)
            .cloned())
    }

    async fn update_by_id(&self, record: &DeliveryRecord) -> AppResult<DeliveryRecord> {
        self.delivery_updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let Some(existing) = state.deliveries.get_mut(&record.id).filter(|d| !d.deletion.is_deleted) else {
            return Err(AppError::not_found("Delivery not found"));
        };

        let conflict = self
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflict {
            existing.version += 1;
            return Err(AppError::conflict("Delivery modified concurrently"));
        }
        if existing.version != record.version {
            return Err(AppError::conflict("Delivery modified concurrently"));
        }

        let mut saved = record.clone();
        saved.version += 1;
        *existing = saved.clone();
        Ok(saved)
    }

    async fn delete_by_id(&self, id: &DeliveryId, deleted_by: UserId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.deliveries.get_mut(id).filter(|d| !d.deletion.is_deleted) {
            Some(delivery) => {
                delivery.deletion.mark(deleted_by);
                delivery.version += 1;
                Ok(())
            }
            None => Err(AppError::not_found("Delivery not found")),
        }
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<DeliveryRecord>> {
        let state = self.state.lock().unwrap();
        let items = state
            .deliveries
            .values()
            .filter(|d| !d.deletion.is_deleted && &d.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(page(items, pagination))
    }

    async fn find_batch(&self, delivery_id: &DeliveryId, batch_index: i32) -> AppResult<Option<DeliveryBatch>> {
        let state = self.state.lock().unwrap();
        Ok(state.batches.get(&(*delivery_id, batch_index)).cloned())
    }

    async fn save_batch(&self, batch: &DeliveryBatch) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.deliveries.contains_key(&batch.delivery_id) {
            return Err(AppError::not_found("Failed to save delivery batch: referenced row is missing"));
        }
        state
            .batches
            .insert((batch.delivery_id, batch.batch_index), batch.clone());
        Ok(())
    }

    async fn list_batches(&self, delivery_id: &DeliveryId) -> AppResult<Vec<DeliveryBatch>> {
        Ok(self.batches(delivery_id))
    }
}

#[async_trait]
impl MailOutboxStore for InMemoryStore {
    async fn create(&self, mail: &MailRecord, delivery: &DeliveryRecord) -> AppResult<()> {
        if self.fail_outbox.load(Ordering::SeqCst) {
            return Err(AppError::database("Failed to insert delivery record: connection reset"));
        }
        self.insert_outbox(mail, delivery);
        Ok(())
    }
}

/// 内存对象存储
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    pub opens: AtomicUsize,
}

impl InMemoryObjectStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> HashSet<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn save(&self, key: &str, bytes: &[u8]) -> AppResult<String> {
        self.put(key, bytes);
        Ok(format!("memory://{}", key))
    }

    async fn open(&self, key: &str) -> AppResult<Vec<u8>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.get(key)
            .ok_or_else(|| AppError::not_found(format!("Object {} not found", key)))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

/// 记录投递内容的任务队列
#[derive(Default)]
pub struct RecordingQueue {
    pub payloads: Mutex<Vec<(String, String)>>,
    pub unavailable: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<SendMailJob> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| SendMailJob::from_payload(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> AppResult<String> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::broker_unavailable("Connection refused"));
        }
        let mut payloads = self.payloads.lock().unwrap();
        payloads.push((queue.to_string(), payload.to_string()));
        Ok(format!("{}-0", payloads.len()))
    }
}

/// 可编排结果的服务商
#[derive(Default)]
pub struct ScriptedTransport {
    /// 第 N 次发送失败（从 0 计）
    failing_sends: Mutex<HashSet<usize>>,
    connect_error: Mutex<Option<String>>,
    pub connects: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub passwords: Mutex<Vec<String>>,
    pub sent: Arc<Mutex<Vec<OutgoingMail>>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_send(&self, attempt: usize) {
        self.failing_sends.lock().unwrap().insert(attempt);
    }

    pub fn fail_connect(&self, message: &str) {
        *self.connect_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for ScriptedTransport {
    fn provider_name(&self) -> &str {
        PROVIDER
    }

    async fn connect(&self, _username: &str, password: &Secret<String>) -> AppResult<Box<dyn MailConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.connect_error.lock().unwrap().clone() {
            return Err(AppError::external_service(message));
        }
        self.passwords.lock().unwrap().push(password.expose_secret().clone());

        Ok(Box::new(ScriptedConnection {
            failing_sends: self.failing_sends.lock().unwrap().clone(),
            attempts: Arc::clone(&self.attempts),
            sent: Arc::clone(&self.sent),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ScriptedConnection {
    failing_sends: HashSet<usize>,
    attempts: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl MailConnection for ScriptedConnection {
    async fn send(&mut self, mail: &OutgoingMail) -> AppResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_sends.contains(&attempt) {
            return Err(AppError::provider_send("451 4.3.0 Temporary failure"));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// 组装好的发送链路
pub struct Harness {
    pub owner: UserId,
    pub account: Account,
    pub store: Arc<InMemoryStore>,
    pub remote: Arc<InMemoryObjectStorage>,
    pub cache: Arc<InMemoryObjectStorage>,
    pub queue: Arc<RecordingQueue>,
    pub transport: Arc<ScriptedTransport>,
    pub vault: Arc<CredentialVault>,
    pub renderer: Arc<TemplateRenderer>,
    pub service: Arc<MailDispatchService>,
    pub engine: BatchedSendEngine,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_batch_size(100).await
    }

    pub async fn with_batch_size(batch_size: usize) -> Self {
        let owner = UserId::new();
        let store = InMemoryStore::new();
        let remote = InMemoryObjectStorage::new();
        let cache = InMemoryObjectStorage::new();
        let queue = RecordingQueue::new();
        let transport = ScriptedTransport::new();
        let vault = Arc::new(CredentialVault::new(None));

        let encrypted = vault
            .encrypt(SENDER, &Secret::new(PASSWORD.to_string()))
            .unwrap();
        let account = Account::new(owner, SENDER, "Ops Team", encrypted, true);
        AccountRepository::create(store.as_ref(), &account).await.unwrap();

        let renderer = Arc::new(TemplateRenderer::new(store.clone(), remote.clone(), cache.clone()));
        let service = Arc::new(MailDispatchService::new(
            DispatchOutbox::new(store.clone(), store.clone()),
            TaskDispatcher::new(queue.clone(), STREAM),
            renderer.clone(),
            store.clone(),
            store.clone(),
        ));
        let engine = BatchedSendEngine::new(
            store.clone(),
            vault.clone(),
            transport.clone(),
            DeliveryReconciler::new(store.clone(), PROVIDER),
        )
        .with_batch_size(batch_size);

        Self {
            owner,
            account,
            store,
            remote,
            cache,
            queue,
            transport,
            vault,
            renderer,
            service,
            engine,
        }
    }

    /// 执行队列中的全部任务
    pub async fn drain_queue(&self) -> Vec<mail_dispatch::dispatch::application::SendOutcome> {
        let mut outcomes = Vec::new();
        for job in self.queue.jobs() {
            outcomes.push(self.engine.run(&job).await);
        }
        outcomes
    }
}

pub fn recipients(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{}@example.com", i)).collect()
}
