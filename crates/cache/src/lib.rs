//! SQLite genealogical cache.
//!
//! Persists the expensive-to-compute state of a CBGM run -- the apparatus
//! (witness list, variation units, readings, reading relations, reading
//! support) and every witness's genealogical comparisons -- so the
//! reporting front-ends can reload it without reparsing the collation or
//! redoing the comparison fan-out.
//!
//! Passage bitmaps are stored as length-prefixed roaring-serialized
//! BLOBs. Any malformed blob or missing row surfaces as
//! [`Error::Corruption`].

use std::path::Path;

use cbgm_core::apparatus::Apparatus;
use cbgm_core::comparison::GenealogicalComparison;
use cbgm_core::local_stemma::{LocalStemma, LocalStemmaEdge};
use cbgm_core::variation_unit::{Connectivity, VariationUnit};
use cbgm_core::witness::Witness;
use roaring::RoaringBitmap;
use rusqlite::{params, Connection};

pub mod error;

pub use error::Error;

/// Handle over a genealogical cache database.
#[derive(Debug)]
pub struct Cache {
    conn: Connection,
}

impl Cache {
    /// Opens (or creates) a cache database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, Error> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Opens a transient in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] if the database cannot be created.
    pub fn open_in_memory() -> Result<Self, Error> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Writes the apparatus and all witness comparisons, replacing any
    /// previous contents, in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on any statement failure.
    pub fn save(&mut self, app: &Apparatus, witnesses: &[Witness]) -> Result<(), Error> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP TABLE IF EXISTS WITNESSES;
             CREATE TABLE WITNESSES (WITNESS TEXT NOT NULL);
             DROP TABLE IF EXISTS VARIATION_UNITS;
             CREATE TABLE VARIATION_UNITS (
               VARIATION_UNIT TEXT NOT NULL,
               LABEL TEXT NOT NULL,
               CONNECTIVITY INTEGER NOT NULL);
             DROP TABLE IF EXISTS READINGS;
             CREATE TABLE READINGS (
               VARIATION_UNIT TEXT NOT NULL,
               READING TEXT NOT NULL);
             DROP INDEX IF EXISTS READINGS_IDX;
             CREATE INDEX READINGS_IDX ON READINGS (VARIATION_UNIT, READING);
             DROP TABLE IF EXISTS READING_RELATIONS;
             CREATE TABLE READING_RELATIONS (
               VARIATION_UNIT TEXT NOT NULL,
               PRIOR TEXT NOT NULL,
               POSTERIOR TEXT NOT NULL,
               WEIGHT REAL NOT NULL);
             DROP INDEX IF EXISTS READING_RELATIONS_IDX;
             CREATE INDEX READING_RELATIONS_IDX
               ON READING_RELATIONS (VARIATION_UNIT, PRIOR, POSTERIOR);
             DROP TABLE IF EXISTS READING_SUPPORT;
             CREATE TABLE READING_SUPPORT (
               VARIATION_UNIT TEXT NOT NULL,
               WITNESS TEXT NOT NULL,
               READING TEXT NOT NULL);
             DROP INDEX IF EXISTS READING_SUPPORT_IDX;
             CREATE INDEX READING_SUPPORT_IDX
               ON READING_SUPPORT (VARIATION_UNIT, WITNESS);
             DROP TABLE IF EXISTS GENEALOGICAL_COMPARISONS;
             CREATE TABLE GENEALOGICAL_COMPARISONS (
               PRIMARY_WIT TEXT NOT NULL,
               SECONDARY_WIT TEXT NOT NULL,
               EXTANT BLOB NOT NULL,
               AGREEMENTS BLOB NOT NULL,
               PRIOR BLOB NOT NULL,
               POSTERIOR BLOB NOT NULL,
               NOREL BLOB NOT NULL,
               UNCLEAR BLOB NOT NULL,
               EXPLAINED BLOB NOT NULL,
               COST REAL NOT NULL);
             DROP INDEX IF EXISTS GENEALOGICAL_COMPARISONS_IDX;
             CREATE INDEX GENEALOGICAL_COMPARISONS_IDX
               ON GENEALOGICAL_COMPARISONS (PRIMARY_WIT, SECONDARY_WIT);",
        )?;

        tracing::debug!(
            witnesses = app.list_wit().len(),
            units = app.units().len(),
            "populating genealogical cache"
        );
        {
            let mut insert = tx.prepare("INSERT INTO WITNESSES VALUES (?1)")?;
            for wit_id in app.list_wit() {
                insert.execute(params![wit_id])?;
            }
        }
        {
            let mut insert = tx.prepare("INSERT INTO VARIATION_UNITS VALUES (?1, ?2, ?3)")?;
            for vu in app.units() {
                insert.execute(params![
                    vu.id(),
                    vu.label(),
                    connectivity_to_sql(vu.connectivity())
                ])?;
            }
        }
        {
            let mut insert = tx.prepare("INSERT INTO READINGS VALUES (?1, ?2)")?;
            for vu in app.units() {
                for reading in vu.stemma().readings() {
                    insert.execute(params![vu.id(), reading])?;
                }
            }
        }
        {
            let mut insert = tx.prepare("INSERT INTO READING_RELATIONS VALUES (?1, ?2, ?3, ?4)")?;
            for vu in app.units() {
                for edge in vu.stemma().edges() {
                    insert.execute(params![vu.id(), edge.prior, edge.posterior, edge.weight])?;
                }
            }
        }
        {
            let mut insert = tx.prepare("INSERT INTO READING_SUPPORT VALUES (?1, ?2, ?3)")?;
            for vu in app.units() {
                // Keyed off the apparatus's witness order, not map order.
                for wit_id in app.list_wit() {
                    if let Some(reading) = vu.reading_for(wit_id) {
                        insert.execute(params![vu.id(), wit_id, reading])?;
                    }
                }
            }
        }
        {
            let mut insert = tx.prepare(
                "INSERT INTO GENEALOGICAL_COMPARISONS
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for wit in witnesses {
                for comp in wit.comparisons() {
                    insert.execute(params![
                        comp.primary,
                        comp.secondary,
                        bitmap_to_blob(&comp.extant),
                        bitmap_to_blob(&comp.agreements),
                        bitmap_to_blob(&comp.prior),
                        bitmap_to_blob(&comp.posterior),
                        bitmap_to_blob(&comp.norel),
                        bitmap_to_blob(&comp.unclear),
                        bitmap_to_blob(&comp.explained),
                        comp.cost,
                    ])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Reconstructs the apparatus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if a stored local stemma no longer
    /// validates, [`Error::Sqlite`] on query failure.
    pub fn load_apparatus(&self) -> Result<Apparatus, Error> {
        let list_wit = self.witness_ids()?;

        let mut select_units = self
            .conn
            .prepare("SELECT VARIATION_UNIT, LABEL, CONNECTIVITY FROM VARIATION_UNITS ORDER BY ROWID")?;
        let unit_rows: Vec<(String, String, i64)> = select_units
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;
        drop(select_units);

        let mut units = Vec::new();
        for (unit_id, label, connectivity) in unit_rows {

            let mut select_readings = self
                .conn
                .prepare("SELECT READING FROM READINGS WHERE VARIATION_UNIT = ?1 ORDER BY ROWID")?;
            let readings: Vec<String> = select_readings
                .query_map(params![unit_id], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            let mut select_relations = self.conn.prepare(
                "SELECT PRIOR, POSTERIOR, WEIGHT FROM READING_RELATIONS
                 WHERE VARIATION_UNIT = ?1 ORDER BY ROWID",
            )?;
            let edges: Vec<LocalStemmaEdge> = select_relations
                .query_map(params![unit_id], |row| {
                    Ok(LocalStemmaEdge::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                })?
                .collect::<Result<_, _>>()?;

            let mut select_support = self.conn.prepare(
                "SELECT WITNESS, READING FROM READING_SUPPORT
                 WHERE VARIATION_UNIT = ?1 ORDER BY ROWID",
            )?;
            let support = select_support
                .query_map(params![unit_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<_, _>>()?;

            let stemma = LocalStemma::new(
                unit_id.clone(),
                label.clone(),
                readings.clone(),
                edges,
                &hashbrown::HashMap::new(),
            )
            .map_err(|err| Error::Corruption {
                detail: format!("stored local stemma rejected: {err}"),
            })?;
            units.push(VariationUnit::new(
                unit_id,
                label,
                readings,
                support,
                connectivity_from_sql(connectivity)?,
                stemma,
            ));
        }
        Ok(Apparatus::new(list_wit, units))
    }

    /// Witness IDs in apparatus order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Sqlite`] on query failure.
    pub fn witness_ids(&self) -> Result<Vec<String>, Error> {
        let mut select = self
            .conn
            .prepare("SELECT WITNESS FROM WITNESSES ORDER BY ROWID")?;
        let ids = select
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(ids)
    }

    /// Reloads one witness with all of its comparisons.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the witness has no stored
    /// comparisons or a bitmap blob fails to decode.
    pub fn load_witness(&self, wit_id: &str) -> Result<Witness, Error> {
        let mut select = self.conn.prepare(
            "SELECT SECONDARY_WIT, EXTANT, AGREEMENTS, PRIOR, POSTERIOR,
                    NOREL, UNCLEAR, EXPLAINED, COST
             FROM GENEALOGICAL_COMPARISONS
             WHERE PRIMARY_WIT = ?1 ORDER BY ROWID",
        )?;
        let rows = select.query_map(params![wit_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, Vec<u8>>(5)?,
                row.get::<_, Vec<u8>>(6)?,
                row.get::<_, Vec<u8>>(7)?,
                row.get::<_, f64>(8)?,
            ))
        })?;
        let mut comparisons = Vec::new();
        for row in rows {
            let (secondary, extant, agreements, prior, posterior, norel, unclear, explained, cost) =
                row?;
            comparisons.push(GenealogicalComparison {
                primary: wit_id.to_owned(),
                secondary,
                extant: bitmap_from_blob(&extant)?,
                agreements: bitmap_from_blob(&agreements)?,
                prior: bitmap_from_blob(&prior)?,
                posterior: bitmap_from_blob(&posterior)?,
                norel: bitmap_from_blob(&norel)?,
                unclear: bitmap_from_blob(&unclear)?,
                explained: bitmap_from_blob(&explained)?,
                cost,
            });
        }
        if comparisons.is_empty() {
            return Err(Error::Corruption {
                detail: format!("no genealogical comparisons stored for witness {wit_id}"),
            });
        }
        Ok(Witness::from_comparisons(wit_id, comparisons))
    }

    /// Reloads every witness in apparatus order.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::load_witness`] failures.
    pub fn load_witnesses(&self) -> Result<Vec<Witness>, Error> {
        self.witness_ids()?
            .iter()
            .map(|id| self.load_witness(id))
            .collect()
    }
}

const fn connectivity_to_sql(connectivity: Connectivity) -> i64 {
    match connectivity {
        Connectivity::Limited(value) => value as i64,
        Connectivity::Absolute => -1,
    }
}

fn connectivity_from_sql(value: i64) -> Result<Connectivity, Error> {
    if value < 0 {
        return Ok(Connectivity::Absolute);
    }
    u32::try_from(value)
        .map(Connectivity::Limited)
        .map_err(|_| Error::Corruption {
            detail: format!("stored connectivity {value} out of range"),
        })
}

/// Serializes a bitmap as a little-endian length prefix followed by the
/// roaring portable format.
fn bitmap_to_blob(bitmap: &RoaringBitmap) -> Vec<u8> {
    let mut blob = Vec::with_capacity(4 + bitmap.serialized_size());
    let length =
        u32::try_from(bitmap.serialized_size()).expect("bitmap serialization fits in u32");
    blob.extend_from_slice(&length.to_le_bytes());
    bitmap
        .serialize_into(&mut blob)
        .expect("serializing into a Vec cannot fail");
    blob
}

fn bitmap_from_blob(blob: &[u8]) -> Result<RoaringBitmap, Error> {
    if blob.len() < 4 {
        return Err(Error::Corruption {
            detail: "bitmap blob shorter than its length prefix".to_owned(),
        });
    }
    let mut prefix = [0u8; 4];
    prefix.copy_from_slice(&blob[..4]);
    let length = u32::from_le_bytes(prefix) as usize;
    let payload = &blob[4..];
    if payload.len() != length {
        return Err(Error::Corruption {
            detail: format!(
                "bitmap blob length {} does not match prefix {length}",
                payload.len()
            ),
        });
    }
    RoaringBitmap::deserialize_from(payload).map_err(|err| Error::Corruption {
        detail: format!("bitmap blob failed to decode: {err}"),
    })
}
