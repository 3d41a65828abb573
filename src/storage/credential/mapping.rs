use crate::auth::types::Credential;
use crate::storage::credential::entity::Model as CredentialModel;
use crate::utils::time::{format_timestamp, parse_timestamp};

use super::StoreError;

impl TryFrom<CredentialModel> for Credential {
    type Error = StoreError;

    fn try_from(model: CredentialModel) -> Result<Self, Self::Error> {
        let expiration_date = parse_timestamp(&model.expiration_date).ok_or_else(|| StoreError::Malformed {
            column: "expiration_date",
            value: model.expiration_date.clone(),
        })?;

        let latest_query_date = match model.latest_query_date {
            Some(value) => Some(parse_timestamp(&value).ok_or(StoreError::Malformed {
                column: "latest_query_date",
                value,
            })?),
            None => None,
        };

        let total_queries = u64::try_from(model.total_queries).map_err(|_| StoreError::Malformed {
            column: "total_queries",
            value: model.total_queries.to_string(),
        })?;

        Ok(Credential {
            key_id: model.key_id,
            username: model.username,
            email: model.email,
            password_hash: model.password_hash,
            is_active: model.is_active,
            never_expire: model.never_expire,
            expiration_date,
            latest_query_date,
            total_queries,
        })
    }
}

impl From<Credential> for CredentialModel {
    fn from(credential: Credential) -> Self {
        CredentialModel {
            key_id: credential.key_id,
            username: credential.username,
            email: credential.email,
            password_hash: credential.password_hash,
            is_active: credential.is_active,
            never_expire: credential.never_expire,
            expiration_date: format_timestamp(&credential.expiration_date),
            latest_query_date: credential.latest_query_date.as_ref().map(format_timestamp),
            total_queries: i64::try_from(credential.total_queries).unwrap_or(i64::MAX),
        }
    }
}
