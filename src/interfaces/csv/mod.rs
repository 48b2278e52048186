pub mod recipient_reader;
