// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Translation between resource table entries and values XML
//! (`res/values/*.xml`): the bag decoder chain, the bag encoders and the
//! scalar value elements around them.

pub mod bag_decoder;
pub mod bag_encoder;
pub mod entry_coder;
pub mod entry_writer;
pub mod styled_string;
pub mod xml_tree;
