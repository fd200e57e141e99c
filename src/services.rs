//! Wiring of the core components shared by the poller, the sweeper and the API.

use std::sync::Arc;

use crate::chain::{Lamports, Settlement};
use crate::challenge::{ChallengeEngine, ExportFlow, UpdateFlow, WithdrawFlow};
use crate::clock::Clock;
use crate::config::schema::{CampaignsConfig, ChallengesConfig};
use crate::crypto::Envelope;
use crate::ledger::{Accounts, Ledger, LedgerRules};
use crate::notify::Notifications;
use crate::oracle::PriceOracle;
use crate::store::DocumentStore;

/// External collaborators the core is built on.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub settlement: Arc<dyn Settlement>,
    pub oracle: Arc<dyn PriceOracle>,
    pub envelope: Arc<Envelope>,
    pub clock: Arc<dyn Clock>,
    pub notifications: Notifications,
}

/// Core settings.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub campaigns: CampaignsConfig,
    pub challenges: ChallengesConfig,
    pub fee_buffer: Lamports,
    pub price_asset: String,
}

/// The ledger and the three challenge engines over one set of collaborators.
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Ledger,
    pub export: ChallengeEngine<ExportFlow>,
    pub withdraw: ChallengeEngine<WithdrawFlow>,
    pub update: ChallengeEngine<UpdateFlow>,
    pub campaigns: CampaignsConfig,
}

impl Services {
    pub fn new(deps: Collaborators, settings: CoreSettings) -> Self {
        let Collaborators {
            store,
            settlement,
            oracle,
            envelope,
            clock,
            notifications,
        } = deps;

        let accounts = Accounts::new(
            Arc::clone(&store),
            Arc::clone(&settlement),
            Arc::clone(&envelope),
            Arc::clone(&clock),
        );
        let ledger = Ledger::new(
            Arc::clone(&store),
            Arc::clone(&settlement),
            oracle,
            envelope,
            Arc::clone(&clock),
            accounts.clone(),
            notifications,
            LedgerRules {
                campaigns: settings.campaigns.clone(),
                fee_buffer: settings.fee_buffer,
                price_asset: settings.price_asset,
            },
        );

        let export = ChallengeEngine::new(
            ExportFlow::new(accounts.clone(), settings.challenges.export),
            Arc::clone(&store),
            Arc::clone(&clock),
        );
        let withdraw = ChallengeEngine::new(
            WithdrawFlow::new(
                accounts,
                settlement,
                settings.fee_buffer,
                settings.challenges.withdraw,
            ),
            Arc::clone(&store),
            Arc::clone(&clock),
        );
        let update = ChallengeEngine::new(
            UpdateFlow::new(ledger.clone(), settings.challenges.update),
            Arc::clone(&store),
            Arc::clone(&clock),
        );

        Self {
            store,
            clock,
            ledger,
            export,
            withdraw,
            update,
            campaigns: settings.campaigns,
        }
    }

    pub fn accounts(&self) -> &Accounts {
        self.ledger.accounts()
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}
