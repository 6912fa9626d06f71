pub mod trigger_research;
