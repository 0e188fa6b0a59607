//! CoreDuet interactions
//!
//! `interactionC.db` records who the user interacted with, through which
//! app, and when.

use crate::domain::entities::TimelineEvent;
use crate::domain::repositories::{Extractor, ModuleContext, ModuleError};
use crate::infrastructure::modules::sqlite::{db_error, integer, open_database, real, text};
use crate::infrastructure::modules::time::from_apple_time_opt;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use tracing::info;

const INTERACTIONS_QUERY: &str = "SELECT
        ZINTERACTIONS.ZSTARTDATE,
        ZINTERACTIONS.ZENDDATE,
        ZINTERACTIONS.ZBUNDLEID,
        ZINTERACTIONS.ZACCOUNT,
        ZINTERACTIONS.ZTARGETBUNDLEID,
        CASE ZINTERACTIONS.ZDIRECTION
            WHEN '0' THEN 'INCOMING'
            WHEN '1' THEN 'OUTGOING'
        END 'DIRECTION',
        ZCONTACTS.ZDISPLAYNAME,
        ZCONTACTS.ZIDENTIFIER,
        ZCONTACTS.ZPERSONID,
        RECIPIENTCONTACT.ZDISPLAYNAME,
        RECIPIENTCONTACT.ZIDENTIFIER,
        RECIPIENTCONTACT.ZPERSONID,
        ZINTERACTIONS.ZRECIPIENTCOUNT,
        ZINTERACTIONS.ZDOMAINIDENTIFIER,
        ZINTERACTIONS.ZISRESPONSE,
        ZATTACHMENT.ZCONTENTTEXT,
        ZATTACHMENT.ZUTI,
        ZATTACHMENT.ZCONTENTURL,
        ZATTACHMENT.ZSIZEINBYTES,
        ZATTACHMENT.ZPHOTOLOCALIDENTIFIER,
        HEX(ZATTACHMENT.ZIDENTIFIER),
        ZATTACHMENT.ZCLOUDIDENTIFIER,
        ZCONTACTS.ZINCOMINGRECIPIENTCOUNT,
        ZCONTACTS.ZINCOMINGSENDERCOUNT,
        ZCONTACTS.ZOUTGOINGRECIPIENTCOUNT,
        ZINTERACTIONS.ZCREATIONDATE,
        ZCONTACTS.ZCREATIONDATE,
        ZCONTACTS.ZFIRSTINCOMINGRECIPIENTDATE,
        ZCONTACTS.ZFIRSTINCOMINGSENDERDATE,
        ZCONTACTS.ZFIRSTOUTGOINGRECIPIENTDATE,
        ZCONTACTS.ZLASTINCOMINGSENDERDATE,
        ZCONTACTS.ZLASTINCOMINGRECIPIENTDATE,
        ZCONTACTS.ZLASTOUTGOINGRECIPIENTDATE,
        ZCONTACTS.ZCUSTOMIDENTIFIER,
        ZINTERACTIONS.ZCONTENTURL,
        ZINTERACTIONS.ZLOCATIONUUID,
        ZINTERACTIONS.ZGROUPNAME,
        ZINTERACTIONS.ZDERIVEDINTENTIDENTIFIER,
        ZINTERACTIONS.Z_PK
    FROM ZINTERACTIONS
    LEFT JOIN ZCONTACTS ON ZINTERACTIONS.ZSENDER = ZCONTACTS.Z_PK
    LEFT JOIN Z_1INTERACTIONS ON ZINTERACTIONS.Z_PK = Z_1INTERACTIONS.Z_3INTERACTIONS
    LEFT JOIN ZATTACHMENT ON Z_1INTERACTIONS.Z_1ATTACHMENTS = ZATTACHMENT.Z_PK
    LEFT JOIN Z_2INTERACTIONRECIPIENT ON ZINTERACTIONS.Z_PK = Z_2INTERACTIONRECIPIENT.Z_3INTERACTIONRECIPIENT
    LEFT JOIN ZCONTACTS RECIPIENTCONTACT ON Z_2INTERACTIONRECIPIENT.Z_2RECIPIENTS = RECIPIENTCONTACT.Z_PK";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub bundle_id: Option<String>,
    pub account: Option<String>,
    pub target_bundle_id: Option<String>,
    pub direction: Option<String>,
    pub sender_display_name: Option<String>,
    pub sender_identifier: Option<String>,
    pub sender_personid: Option<String>,
    pub recipient_display_name: Option<String>,
    pub recipient_identifier: Option<String>,
    pub recipient_personid: Option<String>,
    pub recipient_count: Option<i64>,
    pub domain_identifier: Option<String>,
    pub is_response: Option<i64>,
    pub content: Option<String>,
    pub uti: Option<String>,
    pub content_url: Option<String>,
    pub size: Option<i64>,
    pub photo_local_id: Option<String>,
    pub attachment_id: Option<String>,
    pub cloud_id: Option<String>,
    pub incoming_recipient_count: Option<i64>,
    pub incoming_sender_count: Option<i64>,
    pub outgoing_recipient_count: Option<i64>,
    pub interactions_creation_date: Option<DateTime<Utc>>,
    pub contacts_creation_date: Option<DateTime<Utc>>,
    pub first_incoming_recipient_date: Option<DateTime<Utc>>,
    pub first_incoming_sender_date: Option<DateTime<Utc>>,
    pub first_outgoing_recipient_date: Option<DateTime<Utc>>,
    pub last_incoming_sender_date: Option<DateTime<Utc>>,
    pub last_incoming_recipient_date: Option<DateTime<Utc>>,
    pub last_outgoing_recipient_date: Option<DateTime<Utc>>,
    pub custom_id: Option<String>,
    pub interaction_content_url: Option<String>,
    pub location_uuid: Option<String>,
    pub group_name: Option<String>,
    pub derived_intent_id: Option<String>,
    pub table_id: Option<i64>,
}

impl Interaction {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let s = |i: usize| row.get(i).map(text);
        let n = |i: usize| row.get(i).map(integer);
        let t = |i: usize| row.get(i).map(real).map(from_apple_time_opt);

        Ok(Self {
            start_date: t(0)?,
            end_date: t(1)?,
            bundle_id: s(2)?,
            account: s(3)?,
            target_bundle_id: s(4)?,
            direction: s(5)?,
            sender_display_name: s(6)?,
            sender_identifier: s(7)?,
            sender_personid: s(8)?,
            recipient_display_name: s(9)?,
            recipient_identifier: s(10)?,
            recipient_personid: s(11)?,
            recipient_count: n(12)?,
            domain_identifier: s(13)?,
            is_response: n(14)?,
            content: s(15)?,
            uti: s(16)?,
            content_url: s(17)?,
            size: n(18)?,
            photo_local_id: s(19)?,
            attachment_id: s(20)?.filter(|id| !id.is_empty()),
            cloud_id: s(21)?,
            incoming_recipient_count: n(22)?,
            incoming_sender_count: n(23)?,
            outgoing_recipient_count: n(24)?,
            interactions_creation_date: t(25)?,
            contacts_creation_date: t(26)?,
            first_incoming_recipient_date: t(27)?,
            first_incoming_sender_date: t(28)?,
            first_outgoing_recipient_date: t(29)?,
            last_incoming_sender_date: t(30)?,
            last_incoming_recipient_date: t(31)?,
            last_outgoing_recipient_date: t(32)?,
            custom_id: s(33)?,
            interaction_content_url: s(34)?,
            location_uuid: s(35)?,
            group_name: s(36)?,
            derived_intent_id: s(37)?,
            table_id: n(38)?,
        })
    }

    /// Timestamp fields in the order they appear on the timeline
    fn timestamps(&self) -> [(&'static str, Option<DateTime<Utc>>); 10] {
        [
            ("start_date", self.start_date),
            ("end_date", self.end_date),
            ("interactions_creation_date", self.interactions_creation_date),
            ("contacts_creation_date", self.contacts_creation_date),
            ("first_incoming_recipient_date", self.first_incoming_recipient_date),
            ("first_incoming_sender_date", self.first_incoming_sender_date),
            ("first_outgoing_recipient_date", self.first_outgoing_recipient_date),
            ("last_incoming_sender_date", self.last_incoming_sender_date),
            ("last_incoming_recipient_date", self.last_incoming_recipient_date),
            ("last_outgoing_recipient_date", self.last_outgoing_recipient_date),
        ]
    }

    fn describe(&self) -> String {
        let f = |v: &Option<String>| v.clone().unwrap_or_default();
        format!(
            "[{}] {} - from {} ({}) to {} ({}): {}",
            f(&self.bundle_id),
            f(&self.account),
            f(&self.sender_display_name),
            f(&self.sender_identifier),
            f(&self.recipient_display_name),
            f(&self.recipient_identifier),
            f(&self.content),
        )
    }
}

pub struct InteractionC;

impl Extractor for InteractionC {
    type Record = Interaction;

    const NAME: &'static str = "InteractionC";
    const SLUG: &'static str = "interaction_c";
    const BACKUP_IDS: &'static [&'static str] = &["1f5a521220a3ad80ebfdc196978df8e7a2e49dee"];
    const ROOT_PATHS: &'static [&'static str] =
        &["private/var/mobile/Library/CoreDuet/People/interactionC.db"];

    fn new(_ctx: &ModuleContext) -> Self {
        InteractionC
    }

    fn run(&self, ctx: &ModuleContext) -> Result<Vec<Interaction>, ModuleError> {
        let path = self.locate(ctx)?;
        info!("Found InteractionC database at path: {}", path.display());

        let conn = open_database(Self::NAME, &path)?;
        let mut stmt = conn
            .prepare(INTERACTIONS_QUERY)
            .map_err(db_error(Self::NAME, &path))?;
        let interactions = stmt
            .query_map([], Interaction::from_row)
            .map_err(db_error(Self::NAME, &path))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error(Self::NAME, &path))?;

        info!("Extracted a total of {} InteractionC events", interactions.len());
        Ok(interactions)
    }

    /// One event per distinct timestamp, named after the first field
    /// holding it
    fn serialize(&self, record: &Interaction) -> Vec<TimelineEvent> {
        let mut seen = Vec::new();
        let mut events = Vec::new();

        for (field, timestamp) in record.timestamps() {
            let Some(timestamp) = timestamp else {
                continue;
            };
            if seen.contains(&timestamp) {
                continue;
            }
            seen.push(timestamp);
            events.push(TimelineEvent::new(
                Some(timestamp),
                Self::NAME,
                field,
                record.describe(),
            ));
        }

        events
    }
}
