//! Marketplace store and action handlers.
//!
//! Every paid mutation follows one shape: verify identity, verify payment,
//! then commit {ledger entry, business mutation, ownership check} as a single
//! atomic unit. The [`Store`] trait is that atomic-commit contract; each
//! method is one transaction against the persistence layer. When the
//! business step conflicts the whole unit rolls back, so the transaction
//! reference stays unconsumed and the same proof-of-payment can be retried
//! against a corrected request.

use crate::config::MarketConfig;
use crate::errors::{ConflictError, MarketError, PaymentError, Result};
use crate::identity::IdentityVerifier;
use crate::ledger::{LedgerEntry, ReplayGuard};
use crate::payment::{PaymentVerifier, ReceiptSource};
use crate::types::{
    AccountId, ActionKind, FeaturedSlot, IdentityClaim, Listing, ListingDraft, SLOT_COUNT,
};
use crate::utils::{generate_id, parse_tx_reference};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

/// Atomic-commit contract of the persistence layer.
///
/// Each method executes as one all-or-nothing transaction. Ledger-reference
/// races that slip past the verifier's pre-emptive probe must surface as
/// [`PaymentError::AlreadyUsed`] from the commit itself.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a listing and its ledger entry. Fails with
    /// [`ConflictError::DuplicateResource`] if the URL is already listed.
    async fn commit_listing(&self, entry: LedgerEntry, listing: Listing) -> Result<()>;

    /// Rents or renews a featured slot and records its ledger entry. Fails
    /// with [`ConflictError::SlotTaken`] if the slot is active; expired
    /// slots are overwritten.
    async fn commit_slot(&self, entry: LedgerEntry, slot: FeaturedSlot) -> Result<()>;

    /// Deletes a listing the caller owns, recording an audit entry. The
    /// occupied slot, if the listing is featured, is released with it.
    async fn delete_listing(&self, owner: AccountId, listing_id: &str) -> Result<Listing>;

    /// Releases a featured slot whose listing the caller owns, recording an
    /// audit entry.
    async fn release_slot(&self, owner: AccountId, slot_index: u8) -> Result<FeaturedSlot>;

    /// The listing currently in each slot; expired rentals read as empty.
    async fn active_slots(&self) -> Vec<Option<Listing>>;

    /// A payer's ledger entries, newest first.
    async fn history(&self, payer_fid: AccountId) -> Vec<LedgerEntry>;

    /// Looks up a listing by id.
    async fn listing(&self, listing_id: &str) -> Option<Listing>;
}

#[derive(Default)]
struct StoreInner {
    listings: HashMap<String, Listing>,
    slots: HashMap<u8, FeaturedSlot>,
    ledger: BTreeMap<String, LedgerEntry>,
}

impl StoreInner {
    // First-writer-wins on the reference; mirrors the unique constraint a
    // relational backend would enforce at commit.
    fn append_ledger(&mut self, entry: LedgerEntry) -> Result<(), PaymentError> {
        if self.ledger.contains_key(&entry.reference) {
            return Err(PaymentError::AlreadyUsed(entry.reference.clone()));
        }
        self.ledger.insert(entry.reference.clone(), entry);
        Ok(())
    }
}

/// In-memory store: one `RwLock` over the whole state, so every trait method
/// is trivially atomic. Production deployments substitute a relational
/// backend with equivalent transactional guarantees.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReplayGuard for MemoryStore {
    async fn is_consumed(&self, reference: &str) -> bool {
        self.inner.read().await.ledger.contains_key(reference)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn commit_listing(&self, entry: LedgerEntry, listing: Listing) -> Result<()> {
        let mut inner = self.inner.write().await;

        if inner.listings.values().any(|l| l.url == listing.url) {
            return Err(ConflictError::DuplicateResource(listing.url).into());
        }
        inner.append_ledger(entry).map_err(MarketError::from)?;
        inner.listings.insert(listing.id.clone(), listing);
        Ok(())
    }

    async fn commit_slot(&self, entry: LedgerEntry, slot: FeaturedSlot) -> Result<()> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.slots.get(&slot.slot_index) {
            if existing.is_active(Utc::now()) {
                return Err(ConflictError::SlotTaken(slot.slot_index).into());
            }
        }
        inner.append_ledger(entry).map_err(MarketError::from)?;
        inner.slots.insert(slot.slot_index, slot);
        Ok(())
    }

    async fn delete_listing(&self, owner: AccountId, listing_id: &str) -> Result<Listing> {
        let mut inner = self.inner.write().await;

        let owns = inner
            .listings
            .get(listing_id)
            .map(|l| l.owner_fid == owner)
            .unwrap_or(false);
        if !owns {
            return Err(ConflictError::NotOwner(owner).into());
        }

        let listing = inner.listings.remove(listing_id).unwrap();
        inner.slots.retain(|_, slot| slot.listing_id != listing.id);

        let entry = LedgerEntry::unpaid(
            owner,
            ActionKind::DeleteListing,
            &listing.id,
            format!("Deleted listing: {}", listing.name),
        );
        inner.append_ledger(entry).map_err(MarketError::from)?;
        Ok(listing)
    }

    async fn release_slot(&self, owner: AccountId, slot_index: u8) -> Result<FeaturedSlot> {
        let mut inner = self.inner.write().await;

        let owns = match inner.slots.get(&slot_index) {
            Some(slot) => inner
                .listings
                .get(&slot.listing_id)
                .map(|l| l.owner_fid == owner)
                .unwrap_or(false),
            None => false,
        };
        if !owns {
            return Err(ConflictError::NotOwner(owner).into());
        }

        let slot = inner.slots.remove(&slot_index).unwrap();
        let entry = LedgerEntry::unpaid(
            owner,
            ActionKind::DeleteFeatured,
            &slot.listing_id,
            format!("Released slot #{}", slot_index + 1),
        );
        inner.append_ledger(entry).map_err(MarketError::from)?;
        Ok(slot)
    }

    async fn active_slots(&self) -> Vec<Option<Listing>> {
        let inner = self.inner.read().await;
        let now = Utc::now();

        (0..SLOT_COUNT)
            .map(|index| {
                inner
                    .slots
                    .get(&index)
                    .filter(|slot| slot.is_active(now))
                    .and_then(|slot| inner.listings.get(&slot.listing_id))
                    .cloned()
            })
            .collect()
    }

    async fn history(&self, payer_fid: AccountId) -> Vec<LedgerEntry> {
        let inner = self.inner.read().await;
        let mut out: Vec<LedgerEntry> = inner
            .ledger
            .values()
            .filter(|e| e.payer_fid == payer_fid)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    async fn listing(&self, listing_id: &str) -> Option<Listing> {
        self.inner.read().await.listings.get(listing_id).cloned()
    }
}

/// The action-handler layer: orchestrates identity verification, payment
/// verification, and atomic commit for every marketplace operation.
pub struct Marketplace {
    config: MarketConfig,
    identity: Arc<dyn IdentityVerifier>,
    payments: PaymentVerifier,
    store: Arc<dyn Store>,
}

impl Marketplace {
    /// Wires the marketplace together. The store doubles as the replay
    /// guard so the payment verifier and the commits see one ledger.
    pub fn new<S>(
        config: MarketConfig,
        identity: Arc<dyn IdentityVerifier>,
        receipts: Arc<dyn ReceiptSource>,
        store: Arc<S>,
    ) -> Self
    where
        S: Store + ReplayGuard + 'static,
    {
        let replay: Arc<dyn ReplayGuard> = store.clone();
        let payments = PaymentVerifier::new(&config, receipts, replay);
        Self {
            config,
            identity,
            payments,
            store,
        }
    }

    /// Creates a paid listing.
    pub async fn list_app(
        &self,
        claim: &IdentityClaim,
        tx_reference: &str,
        draft: ListingDraft,
    ) -> Result<Listing> {
        let who = self.identity.verify(claim).await?;

        if draft.name.trim().is_empty() {
            return Err(MarketError::InvalidRequest("listing name is empty".into()));
        }
        Url::parse(&draft.url)
            .map_err(|e| MarketError::InvalidRequest(format!("bad listing URL: {}", e)))?;

        let reference = parse_tx_reference(tx_reference).map_err(MarketError::from)?;
        let price = self.config.price_for(ActionKind::Listing);
        self.payments.verify(reference, price, who.address).await?;

        let listing = Listing {
            id: generate_id(),
            name: draft.name,
            description: draft.description,
            url: draft.url,
            icon_url: draft.icon_url,
            category: draft.category,
            owner_fid: who.account_id,
            verified: draft.verified,
            created_at: Utc::now(),
        };
        let entry = LedgerEntry::paid(
            format!("{:#x}", reference),
            who.account_id,
            ActionKind::Listing,
            price,
            format!("Listed: {}", listing.name),
        );

        match self.store.commit_listing(entry, listing.clone()).await {
            Ok(()) => {
                info!(listing_id = %listing.id, owner = who.account_id, "listing created");
                Ok(listing)
            }
            Err(err) => {
                // On a business conflict the reference was not consumed; the
                // caller may retry with the same proof-of-payment.
                warn!(owner = who.account_id, error = %err, "listing commit failed");
                Err(err)
            }
        }
    }

    /// Rents a featured slot for the configured duration.
    pub async fn rent_slot(
        &self,
        claim: &IdentityClaim,
        tx_reference: &str,
        slot_index: u8,
        listing_id: &str,
    ) -> Result<FeaturedSlot> {
        let who = self.identity.verify(claim).await?;

        if slot_index >= SLOT_COUNT {
            return Err(MarketError::InvalidRequest(format!(
                "slot index {} out of range 0..{}",
                slot_index, SLOT_COUNT
            )));
        }
        if self.store.listing(listing_id).await.is_none() {
            return Err(MarketError::InvalidRequest(format!(
                "no such listing: {}",
                listing_id
            )));
        }

        let reference = parse_tx_reference(tx_reference).map_err(MarketError::from)?;
        let price = self.config.price_for(ActionKind::Featured);
        self.payments.verify(reference, price, who.address).await?;

        let slot = FeaturedSlot {
            slot_index,
            listing_id: listing_id.to_string(),
            expires_at: Utc::now() + self.config.featured_duration,
        };
        let entry = LedgerEntry::paid(
            format!("{:#x}", reference),
            who.account_id,
            ActionKind::Featured,
            price,
            format!("Rented slot #{}", slot_index + 1),
        );

        self.store.commit_slot(entry, slot.clone()).await?;
        info!(slot_index, listing_id, owner = who.account_id, "slot rented");
        Ok(slot)
    }

    /// Deletes a listing the caller owns. Unpaid; still identity-gated and
    /// recorded in the ledger as an audit entry.
    pub async fn delete_listing(&self, claim: &IdentityClaim, listing_id: &str) -> Result<Listing> {
        let who = self.identity.verify(claim).await?;
        let listing = self.store.delete_listing(who.account_id, listing_id).await?;
        info!(listing_id, owner = who.account_id, "listing deleted");
        Ok(listing)
    }

    /// Releases a featured slot occupied by a listing the caller owns.
    pub async fn release_slot(&self, claim: &IdentityClaim, slot_index: u8) -> Result<FeaturedSlot> {
        let who = self.identity.verify(claim).await?;

        if slot_index >= SLOT_COUNT {
            return Err(MarketError::InvalidRequest(format!(
                "slot index {} out of range 0..{}",
                slot_index, SLOT_COUNT
            )));
        }

        let slot = self.store.release_slot(who.account_id, slot_index).await?;
        info!(slot_index, owner = who.account_id, "slot released");
        Ok(slot)
    }

    /// The current featured carousel: one entry per slot, expired rentals
    /// reported empty.
    pub async fn active_slots(&self) -> Vec<Option<Listing>> {
        self.store.active_slots().await
    }

    /// The caller's transaction history, newest first. Identity-gated so a
    /// caller can only read their own entries.
    pub async fn history(&self, claim: &IdentityClaim) -> Result<Vec<LedgerEntry>> {
        let who = self.identity.verify(claim).await?;
        Ok(self.store.history(who.account_id).await)
    }
}
