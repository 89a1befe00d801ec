pub mod food_cmd;
