/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

mod cache_aside_tests;
mod purchase_flow_tests;
