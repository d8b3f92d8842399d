//! Business flows built on the store and collaborators
//!
//! [`Services`] wires every flow to one set of collaborators. All fields are
//! cheap to clone.

pub mod accounts;
pub mod login;
pub mod profile;
pub mod signup;

use std::sync::Arc;

use crate::auth::jwt::TokenIssuer;
use crate::auth::session::SessionRotator;
use crate::crypto::DataCrypto;
use crate::email::EmailSender;
use crate::store::Store;

pub use accounts::AccountService;
pub use login::LoginService;
pub use profile::ProfileService;
pub use signup::SignupService;

#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub tokens: TokenIssuer,
    pub sessions: SessionRotator,
    pub signup: SignupService,
    pub login: LoginService,
    pub accounts: AccountService,
    pub profile: ProfileService,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        crypto: Arc<dyn DataCrypto>,
        email: Arc<dyn EmailSender>,
        tokens: TokenIssuer,
    ) -> Self {
        let sessions = SessionRotator::new(store.clone(), tokens.clone());

        Self {
            signup: SignupService::new(
                store.clone(),
                tokens.clone(),
                crypto.clone(),
                email.clone(),
                sessions.clone(),
            ),
            login: LoginService::new(store.clone(), email.clone(), sessions.clone()),
            accounts: AccountService::new(store.clone(), crypto, email),
            profile: ProfileService::new(store.clone()),
            sessions,
            tokens,
            store,
        }
    }
}
