use crate::config::RosterConfig;
use crate::error::DeliveryError;
use crate::models::{ActorProfile, Address};
use crate::state_machine::Role;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a resolver knows about the order it is staffing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentContext {
    pub order_id: String,
    pub restaurant_id: String,
    pub delivery_address: Option<Address>,
}

/// Error types for actor selection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    #[error("No {role} available for restaurant {restaurant_id}")]
    NoActorsAvailable { role: Role, restaurant_id: String },
}

impl From<SelectionError> for DeliveryError {
    fn from(error: SelectionError) -> Self {
        match error {
            SelectionError::NoActorsAvailable {
                role,
                restaurant_id,
            } => DeliveryError::AssignmentUnavailable {
                role,
                restaurant_id,
            },
        }
    }
}

/// Chooses who cooks, dispatches and delivers an order.
///
/// Implementations can be swapped for an availability-aware scheduler without touching
/// orchestration.
#[async_trait]
pub trait AssignmentResolver: Send + Sync {
    async fn select_cook(&self, ctx: &AssignmentContext) -> Result<ActorProfile, SelectionError>;

    async fn select_dispatcher(
        &self,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError>;

    async fn select_courier(&self, ctx: &AssignmentContext)
        -> Result<ActorProfile, SelectionError>;

    async fn select(&self, role: Role, ctx: &AssignmentContext) -> Result<ActorProfile, SelectionError> {
        match role {
            Role::Cook => self.select_cook(ctx).await,
            Role::Dispatcher => self.select_dispatcher(ctx).await,
            Role::Courier => self.select_courier(ctx).await,
        }
    }
}

/// Placeholder policy: uniform random pick from a static roster.
#[derive(Debug, Clone)]
pub struct RosterAssignmentResolver {
    roster: RosterConfig,
}

impl RosterAssignmentResolver {
    pub fn new(roster: RosterConfig) -> Self {
        Self { roster }
    }

    fn pick(
        candidates: &[ActorProfile],
        role: Role,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError> {
        let picked = candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| SelectionError::NoActorsAvailable {
                role,
                restaurant_id: ctx.restaurant_id.clone(),
            })?;
        debug!(order_id = %ctx.order_id, %role, actor_id = %picked.id, "actor selected");
        Ok(picked)
    }
}

#[async_trait]
impl AssignmentResolver for RosterAssignmentResolver {
    async fn select_cook(&self, ctx: &AssignmentContext) -> Result<ActorProfile, SelectionError> {
        Self::pick(&self.roster.cooks, Role::Cook, ctx)
    }

    async fn select_dispatcher(
        &self,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError> {
        Self::pick(&self.roster.dispatchers, Role::Dispatcher, ctx)
    }

    async fn select_courier(
        &self,
        ctx: &AssignmentContext,
    ) -> Result<ActorProfile, SelectionError> {
        Self::pick(&self.roster.couriers, Role::Courier, ctx)
    }
}
