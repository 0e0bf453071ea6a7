use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::access::AccessGrant;
use procura_core::domain::normalize_code;
use procura_core::domain::product::{Product, ProductId};
use procura_core::domain::supplier::{Supplier, SupplierId};
use procura_core::domain::team::{Demand, ServiceScope, Team};
use procura_core::errors::DomainError;

use super::ServiceError;
use crate::repositories::{
    ProductRepository, RepositoryError, SqlProductRepository, SqlSupplierRepository,
    SqlTeamRepository, SupplierRepository, TeamRepository,
};
use crate::DbPool;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub code: String,
    pub name: String,
    pub specification: Option<String>,
    pub unit: String,
    pub category: Option<String>,
    pub base_price: Option<Decimal>,
    pub base_quantity: Option<Decimal>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInput {
    pub code: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Products, suppliers, teams, scopes and kitchen demand.
pub struct CatalogService {
    products: SqlProductRepository,
    suppliers: SqlSupplierRepository,
    teams: SqlTeamRepository,
}

impl CatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            products: SqlProductRepository::new(pool.clone()),
            suppliers: SqlSupplierRepository::new(pool.clone()),
            teams: SqlTeamRepository::new(pool),
        }
    }

    pub async fn create_product(
        &self,
        grant: &AccessGrant,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        grant.require_manage()?;
        let product = Product {
            id: ProductId(Uuid::new_v4().to_string()),
            code: String::new(),
            name: String::new(),
            specification: None,
            unit: String::new(),
            category: None,
            base_price: None,
            base_quantity: None,
            active: true,
            deleted_at: None,
        };
        self.write_product(product, input).await
    }

    pub async fn update_product(
        &self,
        grant: &AccessGrant,
        id: &ProductId,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        grant.require_manage()?;
        let existing = self
            .products
            .find_by_id(id)
            .await?
            .filter(|product| !product.is_deleted())
            .ok_or_else(|| DomainError::not_found("product", &id.0))?;
        self.write_product(existing, input).await
    }

    async fn write_product(
        &self,
        mut product: Product,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        let code = required("code", &input.code)?;
        product.name = required("name", &input.name)?;
        product.unit = required("unit", &input.unit)?;
        non_negative("base_price", input.base_price)?;
        non_negative("base_quantity", input.base_quantity)?;

        if let Some(other) = self.products.find_by_code(&code).await? {
            if other.id != product.id {
                return Err(code_taken("product", &code));
            }
        }
        product.code = code;
        product.specification = optional(input.specification);
        product.category = optional(input.category);
        product.base_price = input.base_price;
        product.base_quantity = input.base_quantity;

        self.products.save(&product).await.map_err(|error| unique_as_conflict(error, "product", &product.code))?;
        tracing::info!(
            event_name = "catalog.product_saved",
            product_id = %product.id.0,
            code = %product.code,
            "product saved"
        );
        Ok(product)
    }

    pub async fn delete_product(&self, grant: &AccessGrant, id: &ProductId) -> Result<(), ServiceError> {
        grant.require_manage()?;
        if !self.products.soft_delete(id, Utc::now()).await? {
            return Err(DomainError::not_found("product", &id.0).into());
        }
        tracing::info!(event_name = "catalog.product_deleted", product_id = %id.0, "product soft-deleted");
        Ok(())
    }

    pub async fn create_supplier(
        &self,
        grant: &AccessGrant,
        input: SupplierInput,
    ) -> Result<Supplier, ServiceError> {
        grant.require_manage()?;
        let supplier = Supplier {
            id: SupplierId(Uuid::new_v4().to_string()),
            code: String::new(),
            name: String::new(),
            contact_person: None,
            phone: None,
            email: None,
            address: None,
            active: true,
            deleted_at: None,
        };
        self.write_supplier(supplier, input).await
    }

    pub async fn update_supplier(
        &self,
        grant: &AccessGrant,
        id: &SupplierId,
        input: SupplierInput,
    ) -> Result<Supplier, ServiceError> {
        grant.require_manage()?;
        let existing = self
            .suppliers
            .find_by_id(id)
            .await?
            .filter(|supplier| !supplier.is_deleted())
            .ok_or_else(|| DomainError::not_found("supplier", &id.0))?;
        self.write_supplier(existing, input).await
    }

    async fn write_supplier(
        &self,
        mut supplier: Supplier,
        input: SupplierInput,
    ) -> Result<Supplier, ServiceError> {
        let code = required("code", &input.code)?;
        supplier.name = required("name", &input.name)?;

        if let Some(other) = self.suppliers.find_by_code(&code).await? {
            if other.id != supplier.id {
                return Err(code_taken("supplier", &code));
            }
        }
        supplier.code = code;
        supplier.contact_person = optional(input.contact_person);
        supplier.phone = optional(input.phone);
        supplier.email = optional(input.email);
        supplier.address = optional(input.address);

        self.suppliers
            .save(&supplier)
            .await
            .map_err(|error| unique_as_conflict(error, "supplier", &supplier.code))?;
        tracing::info!(
            event_name = "catalog.supplier_saved",
            supplier_id = %supplier.id.0,
            code = %supplier.code,
            "supplier saved"
        );
        Ok(supplier)
    }

    pub async fn delete_supplier(
        &self,
        grant: &AccessGrant,
        id: &SupplierId,
    ) -> Result<(), ServiceError> {
        grant.require_manage()?;
        if !self.suppliers.soft_delete(id, Utc::now()).await? {
            return Err(DomainError::not_found("supplier", &id.0).into());
        }
        tracing::info!(event_name = "catalog.supplier_deleted", supplier_id = %id.0, "supplier soft-deleted");
        Ok(())
    }

    pub async fn save_team(&self, grant: &AccessGrant, mut team: Team) -> Result<Team, ServiceError> {
        grant.require_manage()?;
        team.code = required("code", &team.code)?;
        team.name = required("name", &team.name)?;
        team.region = optional(team.region);

        if let Some(other) = self.teams.find_by_code(&team.code).await? {
            if other.id != team.id {
                return Err(code_taken("team", &team.code));
            }
        }
        self.teams.save(&team).await.map_err(|error| unique_as_conflict(error, "team", &team.code))?;
        Ok(team)
    }

    /// Creates or toggles a supplier's permission to price for a team.
    pub async fn set_scope(
        &self,
        grant: &AccessGrant,
        scope: ServiceScope,
    ) -> Result<ServiceScope, ServiceError> {
        grant.require_manage()?;
        self.suppliers
            .find_by_id(&scope.supplier_id)
            .await?
            .filter(|supplier| !supplier.is_deleted())
            .ok_or_else(|| DomainError::not_found("supplier", &scope.supplier_id.0))?;
        self.teams
            .find_by_id(&scope.team_id)
            .await?
            .ok_or_else(|| DomainError::not_found("team", &scope.team_id.0))?;

        self.teams.save_scope(&scope).await?;
        tracing::info!(
            event_name = "catalog.scope_changed",
            supplier_id = %scope.supplier_id.0,
            team_id = %scope.team_id.0,
            active = scope.active,
            "service scope saved"
        );
        Ok(scope)
    }

    pub async fn set_demand(&self, grant: &AccessGrant, demand: Demand) -> Result<Demand, ServiceError> {
        grant.require_manage()?;
        if demand.quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity", "demand quantity must be positive").into());
        }
        self.teams
            .find_by_id(&demand.team_id)
            .await?
            .ok_or_else(|| DomainError::not_found("team", &demand.team_id.0))?;
        self.products
            .find_by_id(&demand.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", &demand.product_id.0))?;

        self.teams.save_demand(&demand).await?;
        Ok(demand)
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(if field == "code" { normalize_code(value) } else { value.to_string() })
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn non_negative(field: &str, value: Option<Decimal>) -> Result<(), DomainError> {
    if value.is_some_and(|value| value < Decimal::ZERO) {
        return Err(DomainError::validation(field, "must not be negative"));
    }
    Ok(())
}

fn code_taken(entity: &str, code: &str) -> ServiceError {
    DomainError::Conflict(format!("{entity} code `{code}` is already in use")).into()
}

fn unique_as_conflict(error: RepositoryError, entity: &str, code: &str) -> ServiceError {
    if error.is_unique_violation() {
        code_taken(entity, code)
    } else {
        error.into()
    }
}
