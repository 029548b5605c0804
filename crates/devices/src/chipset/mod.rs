//! North bridge models.

pub mod umc_hb4;
