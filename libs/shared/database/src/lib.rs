pub mod filters;
pub mod sequence;
pub mod supabase;
