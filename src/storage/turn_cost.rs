//! Turn-cost records chained per via node.
//!
//! Each node's turn-cost head points at the most recently appended record for that
//! node; records link to the previous head. A record is laid out as
//! `from edge (u32) | to edge (u32) | flags (turn_cost_ints u32) | next + 1 (u32)`.
//! At most one record exists per `(from, to)` pair of a via node; a second write to
//! the same pair only rewrites its flags.

use super::nodes::NodeTable;
use crate::directory::DataStore;
use crate::encoding::Flags;
use crate::types::{EdgeId, NodeId, Result, StoreError};

const FROM: u64 = 0;
const TO: u64 = 4;
const FLAGS: u64 = 8;

/// Records kept allocated past the one being appended.
const RECORD_HEADROOM: u64 = 4;

/// One stored transition at a via node.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnCostEntry {
    /// Edge the turn starts on.
    pub from: EdgeId,
    /// Edge the turn ends on.
    pub to: EdgeId,
    /// Encoded turn-cost values.
    pub flags: Flags,
}

pub(crate) struct TurnCostTable {
    store: Box<dyn DataStore>,
    flag_ints: usize,
    width: u64,
    count: u32,
}

impl TurnCostTable {
    pub(crate) fn width_for(flag_ints: usize) -> u64 {
        FLAGS + 4 * flag_ints as u64 + 4
    }

    pub(crate) fn new(store: Box<dyn DataStore>, flag_ints: usize, count: u32) -> Result<Self> {
        let width = Self::width_for(flag_ints);
        if count as u64 * width > store.capacity() {
            return Err(StoreError::Corruption(
                "turn cost count beyond turn cost store capacity",
            ));
        }
        Ok(Self {
            store,
            flag_ints,
            width,
            count,
        })
    }

    /// Number of records ever appended.
    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub(crate) fn store_mut(&mut self) -> &mut dyn DataStore {
        self.store.as_mut()
    }

    fn next_field(&self) -> u64 {
        FLAGS + 4 * self.flag_ints as u64
    }

    fn record(&self, index: u32) -> Result<(u32, u32, u32)> {
        if index >= self.count {
            return Err(StoreError::Corruption("turn cost link beyond table"));
        }
        let at = index as u64 * self.width;
        let from = self.store.get_u32(at + FROM)?;
        let to = self.store.get_u32(at + TO)?;
        let next = self.store.get_u32(at + self.next_field())?;
        Ok((from, to, next))
    }

    fn read_flags(&self, index: u32) -> Result<Flags> {
        let mut buf = vec![0u8; 4 * self.flag_ints];
        self.store
            .get_bytes(index as u64 * self.width + FLAGS, &mut buf)?;
        Ok(Flags::decode(&buf))
    }

    fn check_width(&self, flags: &Flags) -> Result<()> {
        if flags.len() != self.flag_ints {
            return Err(StoreError::Invalid("flag word width does not match the registry"));
        }
        Ok(())
    }

    fn write_flags(&mut self, index: u32, flags: &Flags) -> Result<()> {
        self.check_width(flags)?;
        let mut buf = vec![0u8; flags.byte_len()];
        flags.encode_into(&mut buf);
        self.store
            .set_bytes(index as u64 * self.width + FLAGS, &buf)
    }

    /// Index of the record for `(from, to)` at `via`, if any.
    fn find(&self, nodes: &NodeTable, from: EdgeId, via: NodeId, to: EdgeId) -> Result<Option<u32>> {
        if via.0 >= nodes.count() {
            return Ok(None);
        }
        let mut cursor = nodes.turn_cost_head(via)?;
        let mut steps = 0u32;
        while let Some(index) = cursor {
            let (rec_from, rec_to, next) = self.record(index)?;
            if rec_from == from.0 && rec_to == to.0 {
                return Ok(Some(index));
            }
            steps += 1;
            if steps > self.count {
                return Err(StoreError::Corruption("turn cost list contains a cycle"));
            }
            cursor = next.checked_sub(1);
        }
        Ok(None)
    }

    /// Stored flags of `(from, via, to)`, or `None` when nothing was set.
    pub(crate) fn flags(
        &self,
        nodes: &NodeTable,
        from: EdgeId,
        via: NodeId,
        to: EdgeId,
    ) -> Result<Option<Flags>> {
        match self.find(nodes, from, via, to)? {
            Some(index) => self.read_flags(index).map(Some),
            None => Ok(None),
        }
    }

    /// Applies `merge` to the flags of `(from, via, to)`, appending a record at the
    /// head of `via`'s list when the pair is new.
    pub(crate) fn merge(
        &mut self,
        nodes: &mut NodeTable,
        from: EdgeId,
        via: NodeId,
        to: EdgeId,
        merge: impl FnOnce(&mut Flags) -> Result<()>,
    ) -> Result<()> {
        nodes.ensure(via)?;
        if let Some(index) = self.find(nodes, from, via, to)? {
            let mut flags = self.read_flags(index)?;
            merge(&mut flags)?;
            return self.write_flags(index, &flags);
        }

        let mut flags = Flags::zeroed(self.flag_ints);
        merge(&mut flags)?;
        self.check_width(&flags)?;
        let index = self.count;
        if index == u32::MAX - 1 {
            return Err(StoreError::Capacity("turn cost records exhausted".into()));
        }
        self.store
            .ensure_capacity((index as u64 + RECORD_HEADROOM) * self.width)?;
        let head = nodes.turn_cost_head(via)?;
        let mut record = vec![0u8; self.width as usize];
        record[FROM as usize..FROM as usize + 4].copy_from_slice(&from.0.to_le_bytes());
        record[TO as usize..TO as usize + 4].copy_from_slice(&to.0.to_le_bytes());
        flags.encode_into(&mut record[FLAGS as usize..]);
        let next = self.next_field() as usize;
        record[next..next + 4].copy_from_slice(&head.map_or(0, |h| h + 1).to_le_bytes());
        self.store.set_bytes(index as u64 * self.width, &record)?;
        self.count += 1;
        nodes.set_turn_cost_head(via, Some(index))
    }

    /// All records of `via`, newest first.
    pub(crate) fn entries(&self, nodes: &NodeTable, via: NodeId) -> Result<Vec<TurnCostEntry>> {
        let mut out = Vec::new();
        if via.0 >= nodes.count() {
            return Ok(out);
        }
        let mut cursor = nodes.turn_cost_head(via)?;
        while let Some(index) = cursor {
            if out.len() > self.count as usize {
                return Err(StoreError::Corruption("turn cost list contains a cycle"));
            }
            let (from, to, next) = self.record(index)?;
            out.push(TurnCostEntry {
                from: EdgeId(from),
                to: EdgeId(to),
                flags: self.read_flags(index)?,
            });
            cursor = next.checked_sub(1);
        }
        Ok(out)
    }
}
