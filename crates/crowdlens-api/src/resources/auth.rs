// Authentication endpoint

use secrecy::SecretString;
use tracing::debug;

use crate::error::Error;
use crate::gateway::{Gateway, LOGIN_PATH};
use crate::models::{LoginRequest, LoginResponse};

impl Gateway {
    /// Exchange credentials for a bearer token.
    ///
    /// `POST auth/login` with `{"email": ..., "password": ...}`. Failures on
    /// this path never force a logout.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, Error> {
        debug!(email, "sending login request");
        self.post(LOGIN_PATH, &LoginRequest { email, password }).await
    }
}
