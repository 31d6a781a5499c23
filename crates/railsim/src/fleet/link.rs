use std::fmt;

use bevy::log::debug;
use bevy::math::IVec3;

use crate::config::CONNECTED_SEARCH_LIMIT;
use crate::events::{EventSink, FleetEvent};
use crate::ids::{CartKey, TrainKey};
use crate::math::distance_xz;
use crate::rail_params::RailParams;
use crate::track::{rails_connected, RailSampler};

use super::{Fleet, FleetError};

/// Why two carts were not linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    SameCart,
    Dead,
    Derailed,
    /// One of the carts was restored from a parked train this tick.
    RecentlyParked,
    LinkingDisabled,
    /// The carts are not on track joined within a few blocks.
    NotConnected,
    TooFar,
    /// One of the carts sits between two others of its train.
    InteriorJoin,
    SameTrain,
    /// Attaching would put the new cart beyond the extremity's neighbour.
    WrongSide,
}

impl fmt::Display for LinkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            LinkRejection::SameCart => "a cart cannot link to itself",
            LinkRejection::Dead => "cart is dead",
            LinkRejection::Derailed => "cart is derailed",
            LinkRejection::RecentlyParked => "cart was just restored",
            LinkRejection::LinkingDisabled => "train does not allow linking",
            LinkRejection::NotConnected => "rails are not connected",
            LinkRejection::TooFar => "carts are too far apart",
            LinkRejection::InteriorJoin => "cannot join at an interior cart",
            LinkRejection::SameTrain => "carts already share a train",
            LinkRejection::WrongSide => "cart is not next to the train extremity",
        };
        f.write_str(reason)
    }
}

impl Fleet {
    /// Couple the train of cart `a` onto the train of cart `b`.
    ///
    /// Only extremities join: head or tail of one train against head or tail
    /// of the other, with the first train reversed where needed so the two
    /// carts end up adjacent. The merged train keeps `b`'s handle and flags.
    pub fn link<S: RailSampler + ?Sized>(
        &mut self,
        a: CartKey,
        b: CartKey,
        sampler: &S,
        params: &RailParams,
        sink: &mut dyn EventSink,
    ) -> Result<TrainKey, FleetError> {
        match self.check_link(a, b, sampler, params) {
            Ok((g1, g2)) => Ok(self.merge(a, b, g1, g2, sink)),
            Err(FleetError::LinkRejected(reason)) => {
                debug!("link {:?} -> {:?} rejected: {}", a, b, reason);
                Err(FleetError::LinkRejected(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `link(a, b)` would succeed, without changing anything.
    pub fn can_link<S: RailSampler + ?Sized>(
        &self,
        a: CartKey,
        b: CartKey,
        sampler: &S,
        params: &RailParams,
    ) -> Result<(), FleetError> {
        self.check_link(a, b, sampler, params).map(|_| ())
    }

    fn check_link<S: RailSampler + ?Sized>(
        &self,
        a: CartKey,
        b: CartKey,
        sampler: &S,
        params: &RailParams,
    ) -> Result<(TrainKey, TrainKey), FleetError> {
        if a == b {
            return Err(LinkRejection::SameCart.into());
        }
        let ca = self.carts.get(a).ok_or(FleetError::UnknownCart(a))?;
        let cb = self.carts.get(b).ok_or(FleetError::UnknownCart(b))?;
        if ca.dead || cb.dead {
            return Err(LinkRejection::Dead.into());
        }
        if ca.is_derailed() || cb.is_derailed() {
            return Err(LinkRejection::Derailed.into());
        }
        if ca.recently_parked || cb.recently_parked {
            return Err(LinkRejection::RecentlyParked.into());
        }

        let g1 = self.train_of(a).ok_or(FleetError::UnknownCart(a))?;
        let g2 = self.train_of(b).ok_or(FleetError::UnknownCart(b))?;
        if g1 == g2 {
            return Err(LinkRejection::SameTrain.into());
        }
        let (t1, t2) = (&self.trains[g1], &self.trains[g2]);
        if !t1.flags.allow_linking || !t2.flags.allow_linking {
            return Err(LinkRejection::LinkingDisabled.into());
        }
        if !t1.is_extremity(a) || !t2.is_extremity(b) {
            return Err(LinkRejection::InteriorJoin.into());
        }
        if !ca.is_near(cb, params.coupling.max_cart_distance) {
            return Err(LinkRejection::TooFar.into());
        }

        let rail_of = |c: &crate::cart::Cart| -> Option<IVec3> {
            c.rail
                .map(|r| r.pos)
                .or_else(|| sampler.detect(c.position).map(|r| r.pos))
        };
        match (rail_of(ca), rail_of(cb)) {
            (Some(ra), Some(rb)) if rails_connected(sampler, ra, rb, CONNECTED_SEARCH_LIMIT) => {}
            _ => return Err(LinkRejection::NotConnected.into()),
        }

        // The joining cart must be closer to the extremity than to the
        // extremity's neighbour, on both sides.
        let d = distance_xz(ca.position, cb.position);
        for (extremity, train, other) in [(b, g2, ca), (a, g1, cb)] {
            if let Some(neighbour) = self.extremity_neighbour(train, extremity) {
                let n = &self.carts[neighbour];
                if d >= distance_xz(other.position, n.position) {
                    return Err(LinkRejection::WrongSide.into());
                }
            }
        }
        Ok((g1, g2))
    }

    fn extremity_neighbour(&self, train: TrainKey, extremity: CartKey) -> Option<CartKey> {
        let t = self.trains.get(train)?;
        if t.len() < 2 {
            return None;
        }
        if t.head() == Some(extremity) {
            t.carts.get(1).copied()
        } else {
            t.carts.get(t.len() - 2).copied()
        }
    }

    fn merge(
        &mut self,
        a: CartKey,
        b: CartKey,
        g1: TrainKey,
        g2: TrainKey,
        sink: &mut dyn EventSink,
    ) -> TrainKey {
        let Some(first) = self.trains.remove(g1) else {
            return g2;
        };
        let a_head = first.head() == Some(a);
        let a_tail = first.tail() == Some(a);
        let mut incoming = first.carts;

        let Some(second) = self.trains.get_mut(g2) else {
            return g2;
        };
        let b_head = second.head() == Some(b);
        let b_tail = second.tail() == Some(b);

        let mut merged = if a_tail && b_head {
            incoming.extend_from_slice(&second.carts);
            incoming
        } else if a_head && b_tail {
            let mut carts = std::mem::take(&mut second.carts);
            carts.extend(incoming);
            carts
        } else if a_head && b_head {
            incoming.reverse();
            incoming.extend_from_slice(&second.carts);
            incoming
        } else {
            incoming.reverse();
            let mut carts = std::mem::take(&mut second.carts);
            carts.extend(incoming);
            carts
        };
        std::mem::swap(&mut second.carts, &mut merged);

        for key in second.carts.clone() {
            if let Some(c) = self.carts.get_mut(key) {
                c.train = Some(g2);
            }
        }
        self.sync_train_triggers(g2, sink);
        self.refresh_headings(g2);
        self.links += 1;

        let join_point = match (self.carts.get(a), self.carts.get(b)) {
            (Some(ca), Some(cb)) => (ca.position + cb.position) * 0.5,
            _ => bevy::math::DVec3::ZERO,
        };
        sink.fire(FleetEvent::Linked {
            train: g2,
            join_point,
        });
        g2
    }
}
