#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    nadrika_leads_lib::run()
}
