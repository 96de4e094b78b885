use serde::{Deserialize, Serialize};

use invoicer_core::{CustomerId, DomainError, DomainResult, Entity, EntityKind};

/// A stored customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Unique across customers.
    pub email: String,
}

impl Entity for Customer {
    type Id = CustomerId;
    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> CustomerId {
        self.id
    }
}

/// Input for creating a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Trim both fields and check them. Returns the cleaned input.
    pub fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            name: clean_name(&self.name)?,
            email: clean_email(&self.email)?,
        })
    }

    pub fn into_customer(self, id: CustomerId) -> Customer {
        Customer {
            id,
            name: self.name,
            email: self.email,
        }
    }
}

/// Partial update for a customer: `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CustomerPatch {
    pub fn validated(self) -> DomainResult<Self> {
        Ok(Self {
            name: self.name.as_deref().map(clean_name).transpose()?,
            email: self.email.as_deref().map(clean_email).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    pub fn apply_to(&self, customer: &mut Customer) {
        if let Some(name) = &self.name {
            customer.name = name.clone();
        }
        if let Some(email) = &self.email {
            customer.email = email.clone();
        }
    }
}

fn clean_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("customer name must not be empty"));
    }
    Ok(name.to_string())
}

fn clean_email(email: &str) -> DomainResult<String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(email.to_string())
        }
        _ => Err(DomainError::validation(format!(
            "customer email '{email}' is not a valid address"
        ))),
    }
}
