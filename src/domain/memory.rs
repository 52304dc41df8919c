//! In-memory collaborators, used by default and in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::config::{AudienceConfig, ClientConfig, WalletConfig};
use crate::crypto::Address;
use crate::domain::StoreError;
use crate::domain::models::{Account, ClientInfo, WalletAuthorization};
use crate::domain::ports::{AccountStore, ClientDirectory, WalletAuthority};

/// An in-memory account store.
#[derive(Debug, Default, Clone)]
pub struct MemoryAccountStore {
    accounts: Arc<DashMap<Uuid, Account>>,
    by_eoa: Arc<DashMap<String, Uuid>>,
    by_email: Arc<DashMap<String, Uuid>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn load(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .get(&id)
            .map(|account| account.value().clone())
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_or_create_by_eoa(&self, eoa: &str) -> Result<Account, StoreError> {
        if eoa.is_empty() {
            return Err(StoreError::Invalid("empty address".into()));
        }
        let id = *self.by_eoa.entry(eoa.to_string()).or_insert_with(|| {
            let account = Account {
                eoa: Some(eoa.to_string()),
                ..Account::new()
            };
            let id = account.id;
            self.accounts.insert(id, account);
            tracing::debug!(%id, eoa, "Created account for EOA");
            id
        });
        self.load(id)
    }

    async fn get_or_create_by_email(&self, email: &str) -> Result<Account, StoreError> {
        if email.is_empty() {
            return Err(StoreError::Invalid("empty email".into()));
        }
        let id = *self.by_email.entry(email.to_string()).or_insert_with(|| {
            let account = Account {
                email: Some(email.to_string()),
                ..Account::new()
            };
            let id = account.id;
            self.accounts.insert(id, account);
            tracing::debug!(%id, "Created account for email");
            id
        });
        self.load(id)
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.get(&id).map(|account| account.value().clone()))
    }

    async fn register_device(&self, id: Uuid, key: &str) -> Result<bool, StoreError> {
        let mut account = self
            .accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::AccountNotFound(id.to_string()))?;
        if account.devices.iter().any(|known| known == key) {
            return Ok(false);
        }
        account.devices.push(key.to_string());
        Ok(true)
    }
}

/// Wallet authority backed by a fixed table of smart wallets and their controller keys.
///
/// Addresses missing from the table are reported as having no contract.
#[derive(Debug, Default, Clone)]
pub struct StaticWalletAuthority {
    wallets: HashMap<Address, HashSet<Address>>,
}

impl StaticWalletAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(mut self, wallet: Address, controllers: impl IntoIterator<Item = Address>) -> Self {
        self.wallets.entry(wallet).or_default().extend(controllers);
        self
    }

    pub fn from_config(wallets: &[WalletConfig]) -> Self {
        wallets.iter().fold(Self::new(), |authority, wallet| {
            authority.with_wallet(wallet.address, wallet.controllers.iter().copied())
        })
    }
}

#[async_trait]
impl WalletAuthority for StaticWalletAuthority {
    async fn authorize(&self, controller: &Address, wallet: &Address) -> WalletAuthorization {
        match self.wallets.get(wallet) {
            None => WalletAuthorization::NoContract,
            Some(controllers) if controllers.contains(controller) => WalletAuthorization::Authorized,
            Some(_) => WalletAuthorization::NotController,
        }
    }
}

/// Client and audience registry loaded from configuration
#[derive(Debug, Default, Clone)]
pub struct StaticClientDirectory {
    clients: HashMap<String, ClientInfo>,
    audiences: HashSet<String>,
}

impl StaticClientDirectory {
    pub fn new(clients: impl IntoIterator<Item = ClientInfo>, audiences: impl IntoIterator<Item = String>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
            audiences: audiences.into_iter().collect(),
        }
    }

    /// Each client may request the audiences that list it among their clients.
    pub fn from_config(clients: &[ClientConfig], audiences: &[AudienceConfig]) -> Self {
        let infos = clients.iter().map(|client| ClientInfo {
            id: client.id.clone(),
            domain: client.domain.clone(),
            label: client.label.clone(),
            audiences: audiences
                .iter()
                .filter(|aud| aud.clients.iter().any(|id| id == &client.id))
                .map(|aud| aud.id.clone())
                .collect(),
        });
        Self::new(infos, audiences.iter().map(|aud| aud.id.clone()))
    }
}

impl ClientDirectory for StaticClientDirectory {
    fn client(&self, client_id: &str) -> Option<ClientInfo> {
        self.clients.get(client_id).cloned()
    }

    fn audiences_exist(&self, audiences: &[String]) -> bool {
        audiences.iter().all(|aud| self.audiences.contains(aud))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[tokio::test]
    async fn test_account_by_eoa_is_stable() {
        let store = MemoryAccountStore::new();
        let first = store.get_or_create_by_eoa("0xabc").await.unwrap();
        let second = store.get_or_create_by_eoa("0xabc").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_account(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_account_by_email_and_devices() {
        let store = MemoryAccountStore::new();
        let account = store.get_or_create_by_email("a@b.com").await.unwrap();
        assert_eq!(account.email.as_deref(), Some("a@b.com"));

        assert!(store.register_device(account.id, "0xkey").await.unwrap());
        assert!(!store.register_device(account.id, "0xkey").await.unwrap());

        let account = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(account.devices, vec!["0xkey".to_string()]);

        assert!(matches!(
            store.register_device(Uuid::new_v4(), "0xkey").await,
            Err(StoreError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wallet_authority_outcomes() {
        let authority = StaticWalletAuthority::new().with_wallet(address(1), [address(2)]);

        assert_eq!(
            authority.authorize(&address(2), &address(1)).await,
            WalletAuthorization::Authorized
        );
        assert_eq!(
            authority.authorize(&address(3), &address(1)).await,
            WalletAuthorization::NotController
        );
        assert_eq!(
            authority.authorize(&address(2), &address(9)).await,
            WalletAuthorization::NoContract
        );
    }

    #[test]
    fn test_client_directory_from_config() {
        let clients = vec![ClientConfig {
            id: "web".into(),
            domain: "https://app.example.com".into(),
            label: "Web".into(),
        }];
        let audiences = vec![
            AudienceConfig {
                id: "api".into(),
                url: "https://api.example.com".into(),
                clients: vec!["web".into()],
            },
            AudienceConfig {
                id: "other".into(),
                url: "https://other.example.com".into(),
                clients: vec![],
            },
        ];
        let directory = StaticClientDirectory::from_config(&clients, &audiences);

        let web = directory.client("web").unwrap();
        assert_eq!(web.audiences, vec!["api".to_string()]);
        assert!(directory.client("unknown").is_none());
        assert!(directory.audiences_exist(&["api".into(), "other".into()]));
        assert!(!directory.audiences_exist(&["missing".into()]));
    }
}
